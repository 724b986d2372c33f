use crate::booking::ResourceSet;
use crate::data_store::auth_token::AccessRole;
use crate::data_store::{EnumMemberNotExistingError, EquipmentId, ReservationId, RoomId, UserId};
use chrono::{DateTime, Utc};
use diesel::deserialize::FromSql;
use diesel::prelude::*;
use diesel::query_builder::bind_collector::RawBytesBindCollector;
use diesel::serialize::ToSql;
use diesel::{AsExpression, FromSqlRow};

#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name=super::schema::users)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: AccessRole,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for classy_api_types::User {
    fn from(value: User) -> Self {
        classy_api_types::User {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role.into(),
            created_at: value.created_at,
        }
    }
}

/// Data for creating or updating a user.
///
/// A `password_hash` of `None` keeps the current password when updating. When creating a user, it
/// is required.
#[derive(Clone, Debug, Insertable, AsChangeset)]
#[diesel(table_name=super::schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: AccessRole,
    pub password_hash: Option<String>,
}

#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name=super::schema::rooms)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub room_type: String,
    pub capacity: i32,
    pub location: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Room> for classy_api_types::Room {
    fn from(value: Room) -> Self {
        classy_api_types::Room {
            id: value.id,
            name: value.name,
            room_type: value.room_type,
            capacity: value.capacity,
            location: value.location,
            available: value.available,
            created_at: value.created_at,
        }
    }
}

#[derive(Clone, Debug, Insertable, AsChangeset)]
#[diesel(table_name=super::schema::rooms)]
pub struct NewRoom {
    pub name: String,
    pub room_type: String,
    pub capacity: i32,
    pub location: String,
    pub available: bool,
}

impl From<classy_api_types::NewRoom> for NewRoom {
    fn from(value: classy_api_types::NewRoom) -> Self {
        Self {
            name: value.name,
            room_type: value.room_type,
            capacity: value.capacity,
            location: value.location,
            available: value.available,
        }
    }
}

#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name=super::schema::equipment)]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
    pub code: String,
    pub barcode: Option<String>,
    pub category: String,
    pub condition: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl Equipment {
    /// Case-insensitive substring match on name, code and category, as used by the equipment
    /// search. `query` must be lowercase already.
    pub fn matches_search(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.code.to_lowercase().contains(query)
            || self.category.to_lowercase().contains(query)
    }
}

impl From<Equipment> for classy_api_types::Equipment {
    fn from(value: Equipment) -> Self {
        classy_api_types::Equipment {
            id: value.id,
            name: value.name,
            code: value.code,
            barcode: value.barcode,
            category: value.category,
            condition: value.condition,
            available: value.available,
            created_at: value.created_at,
        }
    }
}

#[derive(Clone, Debug, Insertable, AsChangeset)]
#[diesel(table_name=super::schema::equipment)]
#[diesel(treat_none_as_null = true)]
pub struct NewEquipment {
    pub name: String,
    pub code: String,
    pub barcode: Option<String>,
    pub category: String,
    pub condition: String,
    pub available: bool,
}

impl From<classy_api_types::NewEquipment> for NewEquipment {
    fn from(value: classy_api_types::NewEquipment) -> Self {
        Self {
            name: value.name,
            code: value.code,
            barcode: value.barcode.filter(|b| !b.trim().is_empty()),
            category: value.category,
            condition: value.condition,
            available: value.available,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, FromSqlRow, AsExpression, Clone, Copy)]
#[diesel(sql_type = diesel::sql_types::Integer)]
#[repr(i32)]
pub enum ReservationStatus {
    Pending = 0,
    Active = 1,
    Cancelled = 2,
    Completed = 3,
}

impl ReservationStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Active => "active",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }
}

impl TryFrom<i32> for ReservationStatus {
    type Error = EnumMemberNotExistingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReservationStatus::Pending),
            1 => Ok(ReservationStatus::Active),
            2 => Ok(ReservationStatus::Cancelled),
            3 => Ok(ReservationStatus::Completed),
            _ => Err(EnumMemberNotExistingError {
                member_value: value,
                enum_name: "ReservationStatus",
            }),
        }
    }
}

impl From<ReservationStatus> for i32 {
    fn from(value: ReservationStatus) -> Self {
        value as i32
    }
}

impl From<ReservationStatus> for classy_api_types::ReservationStatus {
    fn from(value: ReservationStatus) -> Self {
        match value {
            ReservationStatus::Pending => Self::Pending,
            ReservationStatus::Active => Self::Active,
            ReservationStatus::Cancelled => Self::Cancelled,
            ReservationStatus::Completed => Self::Completed,
        }
    }
}

impl From<classy_api_types::ReservationStatus> for ReservationStatus {
    fn from(value: classy_api_types::ReservationStatus) -> Self {
        match value {
            classy_api_types::ReservationStatus::Pending => Self::Pending,
            classy_api_types::ReservationStatus::Active => Self::Active,
            classy_api_types::ReservationStatus::Cancelled => Self::Cancelled,
            classy_api_types::ReservationStatus::Completed => Self::Completed,
        }
    }
}

impl<DB> ToSql<diesel::sql_types::Integer, DB> for ReservationStatus
where
    DB: diesel::backend::Backend,
    for<'c> DB: diesel::backend::Backend<BindCollector<'c> = RawBytesBindCollector<DB>>,
    i32: ToSql<diesel::sql_types::Integer, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        let value: i32 = (*self).into();
        value.to_sql(&mut out.reborrow())
    }
}

impl<DB> FromSql<diesel::sql_types::Integer, DB> for ReservationStatus
where
    DB: diesel::backend::Backend,
    i32: FromSql<diesel::sql_types::Integer, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let x = i32::from_sql(bytes)?;
        x.try_into()
            .map_err(|e: EnumMemberNotExistingError| e.to_string().into())
    }
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name=super::schema::reservations)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: Option<UserId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct FullReservation {
    pub reservation: Reservation,
    pub resources: ResourceSet,
}

impl From<FullReservation> for classy_api_types::Reservation {
    fn from(value: FullReservation) -> Self {
        classy_api_types::Reservation {
            id: value.reservation.id,
            user_id: value.reservation.user_id,
            room_ids: value.resources.room_ids().to_vec(),
            equipment_ids: value.resources.equipment_ids().to_vec(),
            start: value.reservation.start,
            end: value.reservation.end,
            status: value.reservation.status.into(),
            notes: value.reservation.notes,
            created_at: value.reservation.created_at,
        }
    }
}

#[derive(Clone, Debug, Insertable, AsChangeset)]
#[diesel(table_name=super::schema::reservations)]
#[diesel(treat_none_as_null = true)]
pub struct NewReservation {
    pub user_id: Option<UserId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: String,
}

#[derive(Clone, Debug)]
pub struct FullNewReservation {
    pub reservation: NewReservation,
    pub resources: ResourceSet,
}

impl From<FullReservation> for FullNewReservation {
    fn from(value: FullReservation) -> Self {
        FullNewReservation {
            reservation: NewReservation {
                user_id: value.reservation.user_id,
                start: value.reservation.start,
                end: value.reservation.end,
                status: value.reservation.status,
                notes: value.reservation.notes,
            },
            resources: value.resources,
        }
    }
}

// Types for the Reservation-Room and Reservation-Equipment associations, to simplify grouped
// retrieval of the resource ids of reservations using Diesel's .grouped_by() method.
#[derive(Queryable, Associations, Identifiable, Selectable, Insertable)]
#[diesel(table_name=super::schema::reservation_rooms)]
#[diesel(primary_key(reservation_id, room_id))]
#[diesel(belongs_to(Reservation))]
pub struct ReservationRoomMapping {
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
}

#[derive(Queryable, Associations, Identifiable, Selectable, Insertable)]
#[diesel(table_name=super::schema::reservation_equipment)]
#[diesel(primary_key(reservation_id, equipment_id))]
#[diesel(belongs_to(Reservation))]
pub struct ReservationEquipmentMapping {
    pub reservation_id: ReservationId,
    pub equipment_id: EquipmentId,
}

#[derive(Insertable)]
#[diesel(table_name=super::schema::auth_sessions)]
pub struct NewAuthSession {
    pub token_hash: Vec<u8>,
    pub user_id: UserId,
}

/// Complete data set for a bulk import, e.g. from a legacy `db.json` file.
///
/// Entities are identified by the ids of the import source. The store assigns new ids and
/// translates the references of the reservations accordingly.
#[derive(Default)]
pub struct ImportData {
    pub users: Vec<(UserId, NewUser)>,
    pub rooms: Vec<(RoomId, NewRoom)>,
    pub equipment: Vec<(EquipmentId, NewEquipment)>,
    pub reservations: Vec<FullNewReservation>,
}

/// Number of imported entities per kind
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub rooms: usize,
    pub equipment: usize,
    pub reservations: usize,
}
