use super::{
    checks, models, schema, ClassyStore, ClassyStoreFacade, EquipmentId, ReservationFilter,
    ReservationId, RoomId, StoreError, UserId,
};
use crate::auth_session::SessionToken;
use crate::booking::ResourceSet;
use crate::data_store::auth_token::{AccessRole, AuthToken, Privilege};
use crate::data_store::password::verify_password;
use diesel::dsl::not;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::{debug, info};
use std::collections::HashMap;

#[derive(Clone)]
pub struct PgDataStore {
    pool: diesel::r2d2::Pool<diesel::r2d2::ConnectionManager<PgConnection>>,
}

impl PgDataStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        let connection_manager = diesel::r2d2::ConnectionManager::<PgConnection>::new(database_url);
        Ok(Self {
            pool: diesel::r2d2::Pool::builder()
                .test_on_check_out(true)
                .min_idle(Some(2))
                .build(connection_manager)?,
        })
    }
}

impl ClassyStore for PgDataStore {
    fn get_facade<'a>(&'a self) -> Result<Box<dyn ClassyStoreFacade + 'a>, StoreError> {
        Ok(Box::new(PgDataStoreFacade::with_pooled_connection(
            self.pool.get()?,
        )))
    }
}

pub struct PgDataStoreFacade {
    connection: diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>,
}

impl PgDataStoreFacade {
    pub fn with_pooled_connection(
        connection: diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>,
    ) -> Self {
        Self { connection }
    }
}

/// Expect an UPDATE/DELETE statement to have affected exactly one row
fn expect_one_row(affected_rows: usize) -> Result<(), StoreError> {
    if affected_rows == 0 {
        Err(StoreError::NotExisting)
    } else {
        Ok(())
    }
}

impl ClassyStoreFacade for PgDataStoreFacade {
    fn authenticate_with_password(
        &mut self,
        the_email: &str,
        the_password: &str,
        session_token: &SessionToken,
    ) -> Result<models::User, StoreError> {
        use schema::users::dsl::*;

        let user = users
            .filter(email.eq(the_email.trim().to_lowercase()))
            .select(models::User::as_select())
            .first::<models::User>(&mut self.connection)
            .optional()?;
        let user = match user {
            Some(user) if verify_password(the_password, &user.password_hash) => user,
            _ => return Err(StoreError::AuthenticationFailed),
        };

        diesel::insert_into(schema::auth_sessions::table)
            .values(models::NewAuthSession {
                token_hash: session_token.digest(),
                user_id: user.id,
            })
            .execute(&mut self.connection)?;
        debug!("Created session for user {}", user.id);
        Ok(user)
    }

    fn get_auth_token_for_session(
        &mut self,
        session_token: &SessionToken,
        max_age: chrono::Duration,
    ) -> Result<AuthToken, StoreError> {
        use schema::auth_sessions;
        use schema::users;

        let (the_user_id, the_role) = auth_sessions::table
            .inner_join(users::table)
            .filter(auth_sessions::token_hash.eq(session_token.digest()))
            .filter(auth_sessions::created_at.gt(chrono::Utc::now() - max_age))
            .select((users::id, users::role))
            .first::<(UserId, AccessRole)>(&mut self.connection)
            .optional()?
            .ok_or(StoreError::InvalidSession)?;
        Ok(AuthToken::create_for_session(the_user_id, the_role))
    }

    fn logout(&mut self, session_token: &SessionToken) -> Result<(), StoreError> {
        use schema::auth_sessions::dsl::*;

        diesel::delete(auth_sessions.filter(token_hash.eq(session_token.digest())))
            .execute(&mut self.connection)?;
        Ok(())
    }

    fn get_users(&mut self, auth_token: &AuthToken) -> Result<Vec<models::User>, StoreError> {
        use schema::users::dsl::*;
        auth_token.check_privilege(Privilege::ManageUsers)?;

        Ok(users
            .select(models::User::as_select())
            .order_by((name, id))
            .load::<models::User>(&mut self.connection)?)
    }

    fn get_user(
        &mut self,
        auth_token: &AuthToken,
        user_id: UserId,
    ) -> Result<models::User, StoreError> {
        use schema::users::dsl::*;
        auth_token.check_owner_or_privilege(Some(user_id), Privilege::ManageUsers)?;

        Ok(users
            .filter(id.eq(user_id))
            .select(models::User::as_select())
            .first::<models::User>(&mut self.connection)?)
    }

    fn create_user(
        &mut self,
        auth_token: &AuthToken,
        user: models::NewUser,
    ) -> Result<UserId, StoreError> {
        use schema::users::dsl::*;
        auth_token.check_privilege(Privilege::ManageUsers)?;
        if user.password_hash.is_none() {
            return Err(StoreError::InvalidInputData(
                "A password is required for new users.".to_owned(),
            ));
        }

        let new_id = diesel::insert_into(users)
            .values(&user)
            .returning(id)
            .get_result::<UserId>(&mut self.connection)?;
        info!("Created user {} <{}> with id {}", user.name, user.email, new_id);
        Ok(new_id)
    }

    fn update_user(
        &mut self,
        auth_token: &AuthToken,
        user_id: UserId,
        user: models::NewUser,
    ) -> Result<(), StoreError> {
        use schema::users::dsl::*;
        auth_token.check_privilege(Privilege::ManageUsers)?;

        expect_one_row(
            diesel::update(users)
                .filter(id.eq(user_id))
                .set(&user)
                .execute(&mut self.connection)?,
        )
    }

    fn delete_user(&mut self, auth_token: &AuthToken, user_id: UserId) -> Result<(), StoreError> {
        use schema::users::dsl::*;
        auth_token.check_privilege(Privilege::ManageUsers)?;
        if auth_token.user_id() == Some(user_id) {
            return Err(StoreError::InvalidInputData(
                "Users cannot delete their own account.".to_owned(),
            ));
        }

        // Sessions are deleted and reservations turned into guest bookings by the foreign key
        // constraints.
        expect_one_row(diesel::delete(users.filter(id.eq(user_id))).execute(&mut self.connection)?)?;
        info!("Deleted user {}", user_id);
        Ok(())
    }

    fn get_rooms(&mut self, auth_token: &AuthToken) -> Result<Vec<models::Room>, StoreError> {
        use schema::rooms::dsl::*;
        auth_token.check_privilege(Privilege::ShowInventory)?;

        Ok(rooms
            .select(models::Room::as_select())
            .filter(not(deleted))
            .order_by((name, id))
            .load::<models::Room>(&mut self.connection)?)
    }

    fn get_room(
        &mut self,
        auth_token: &AuthToken,
        room_id: RoomId,
    ) -> Result<models::Room, StoreError> {
        use schema::rooms::dsl::*;
        auth_token.check_privilege(Privilege::ShowInventory)?;

        Ok(rooms
            .select(models::Room::as_select())
            .filter(id.eq(room_id))
            .filter(not(deleted))
            .first::<models::Room>(&mut self.connection)?)
    }

    fn create_room(
        &mut self,
        auth_token: &AuthToken,
        room: models::NewRoom,
    ) -> Result<RoomId, StoreError> {
        use schema::rooms::dsl::*;
        auth_token.check_privilege(Privilege::ManageInventory)?;

        Ok(diesel::insert_into(rooms)
            .values(&room)
            .returning(id)
            .get_result::<RoomId>(&mut self.connection)?)
    }

    fn update_room(
        &mut self,
        auth_token: &AuthToken,
        room_id: RoomId,
        room: models::NewRoom,
    ) -> Result<(), StoreError> {
        use schema::rooms::dsl::*;
        auth_token.check_privilege(Privilege::ManageInventory)?;

        expect_one_row(
            diesel::update(rooms)
                .filter(id.eq(room_id))
                .filter(not(deleted))
                .set(&room)
                .execute(&mut self.connection)?,
        )
    }

    fn delete_room(&mut self, auth_token: &AuthToken, room_id: RoomId) -> Result<(), StoreError> {
        use schema::rooms::dsl::*;
        auth_token.check_privilege(Privilege::ManageInventory)?;

        expect_one_row(
            diesel::update(rooms)
                .filter(id.eq(room_id))
                .filter(not(deleted))
                .set(deleted.eq(true))
                .execute(&mut self.connection)?,
        )
    }

    fn get_equipment(&mut self) -> Result<Vec<models::Equipment>, StoreError> {
        use schema::equipment::dsl::*;

        Ok(equipment
            .select(models::Equipment::as_select())
            .filter(not(deleted))
            .order_by((name, id))
            .load::<models::Equipment>(&mut self.connection)?)
    }

    fn get_equipment_item(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
    ) -> Result<models::Equipment, StoreError> {
        use schema::equipment::dsl::*;
        auth_token.check_privilege(Privilege::ShowInventory)?;

        Ok(equipment
            .select(models::Equipment::as_select())
            .filter(id.eq(equipment_id))
            .filter(not(deleted))
            .first::<models::Equipment>(&mut self.connection)?)
    }

    fn get_equipment_by_barcode(
        &mut self,
        auth_token: &AuthToken,
        the_barcode: &str,
    ) -> Result<models::Equipment, StoreError> {
        use schema::equipment::dsl::*;
        auth_token.check_privilege(Privilege::ShowInventory)?;

        Ok(equipment
            .select(models::Equipment::as_select())
            .filter(barcode.eq(the_barcode))
            .filter(not(deleted))
            .first::<models::Equipment>(&mut self.connection)?)
    }

    fn search_equipment(
        &mut self,
        auth_token: &AuthToken,
        query: &str,
    ) -> Result<Vec<models::Equipment>, StoreError> {
        use schema::equipment::dsl::*;
        auth_token.check_privilege(Privilege::ShowInventory)?;

        let pattern = format!("%{}%", escape_like_pattern(query.trim()));
        Ok(equipment
            .select(models::Equipment::as_select())
            .filter(not(deleted))
            .filter(
                name.ilike(&pattern)
                    .or(code.ilike(&pattern))
                    .or(category.ilike(&pattern)),
            )
            .order_by((name, id))
            .load::<models::Equipment>(&mut self.connection)?)
    }

    fn create_equipment(
        &mut self,
        auth_token: &AuthToken,
        item: models::NewEquipment,
    ) -> Result<EquipmentId, StoreError> {
        use schema::equipment::dsl::*;
        auth_token.check_privilege(Privilege::ManageInventory)?;

        Ok(diesel::insert_into(equipment)
            .values(&item)
            .returning(id)
            .get_result::<EquipmentId>(&mut self.connection)?)
    }

    fn update_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
        item: models::NewEquipment,
    ) -> Result<(), StoreError> {
        use schema::equipment::dsl::*;
        auth_token.check_privilege(Privilege::ManageInventory)?;

        expect_one_row(
            diesel::update(equipment)
                .filter(id.eq(equipment_id))
                .filter(not(deleted))
                .set(&item)
                .execute(&mut self.connection)?,
        )
    }

    fn delete_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
    ) -> Result<(), StoreError> {
        use schema::equipment::dsl::*;
        auth_token.check_privilege(Privilege::ManageInventory)?;

        // The barcode is released, so it can be assigned to a new item
        expect_one_row(
            diesel::update(equipment)
                .filter(id.eq(equipment_id))
                .filter(not(deleted))
                .set((deleted.eq(true), barcode.eq(None::<String>)))
                .execute(&mut self.connection)?,
        )
    }

    fn get_reservations_filtered(
        &mut self,
        auth_token: &AuthToken,
        filter: ReservationFilter,
    ) -> Result<Vec<models::FullReservation>, StoreError> {
        use schema::reservations::dsl::*;
        auth_token.check_privilege(Privilege::ShowReservations)?;

        self.connection.transaction(|connection| {
            let mut query = reservations.into_boxed();
            if let Some(the_user_id) = filter.user_id {
                query = query.filter(user_id.eq(the_user_id));
            }
            if let Some(the_status) = filter.status {
                query = query.filter(status.eq(the_status));
            }
            if let Some(after) = filter.after {
                query = query.filter(end.gt(after));
            }
            if let Some(before) = filter.before {
                query = query.filter(start.lt(before));
            }
            let the_reservations = query
                .order_by((start.asc(), id.asc()))
                .select(models::Reservation::as_select())
                .load::<models::Reservation>(connection)?;
            load_resources(connection, the_reservations)
        })
    }

    fn get_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
    ) -> Result<models::FullReservation, StoreError> {
        auth_token.check_privilege(Privilege::ShowReservations)?;

        self.connection
            .transaction(|connection| load_reservation(connection, reservation_id))
    }

    fn create_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation: models::FullNewReservation,
        timezone: &chrono_tz::Tz,
    ) -> Result<ReservationId, StoreError> {
        use schema::reservations::dsl::*;
        checks::check_reservation_data(&reservation)?;
        checks::check_reservation_write_allowed(auth_token, &reservation, None)?;

        // The conflict check and the write must see the same state of the database. Concurrent
        // bookings of the same slot make one of the transactions fail with a serialization error,
        // which is reported as StoreError::TransactionConflict.
        self.connection
            .build_transaction()
            .serializable()
            .run(|connection| {
                check_resources_bookable(connection, &reservation.resources, None)?;
                let overlapping = load_overlapping_active_reservations(connection, &reservation)?;
                checks::check_no_conflict(&reservation, &overlapping, None, timezone)?;

                let new_id = diesel::insert_into(reservations)
                    .values(&reservation.reservation)
                    .returning(id)
                    .get_result::<ReservationId>(connection)?;
                insert_resources(connection, new_id, &reservation.resources)?;
                info!(
                    "Created reservation {} for user {:?} ({} – {})",
                    new_id,
                    reservation.reservation.user_id,
                    reservation.reservation.start,
                    reservation.reservation.end
                );
                Ok(new_id)
            })
    }

    fn update_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
        reservation: models::FullNewReservation,
        timezone: &chrono_tz::Tz,
    ) -> Result<(), StoreError> {
        use schema::reservations::dsl::*;
        checks::check_reservation_data(&reservation)?;

        self.connection
            .build_transaction()
            .serializable()
            .run(|connection| {
                let previous = load_reservation(connection, reservation_id)?;
                checks::check_reservation_write_allowed(
                    auth_token,
                    &reservation,
                    Some(&previous.reservation),
                )?;
                check_resources_bookable(
                    connection,
                    &reservation.resources,
                    Some(&previous.resources),
                )?;
                let overlapping = load_overlapping_active_reservations(connection, &reservation)?;
                checks::check_no_conflict(
                    &reservation,
                    &overlapping,
                    Some(reservation_id),
                    timezone,
                )?;

                diesel::update(reservations)
                    .filter(id.eq(reservation_id))
                    .set(&reservation.reservation)
                    .execute(connection)?;
                diesel::delete(
                    schema::reservation_rooms::table
                        .filter(schema::reservation_rooms::reservation_id.eq(reservation_id)),
                )
                .execute(connection)?;
                diesel::delete(
                    schema::reservation_equipment::table
                        .filter(schema::reservation_equipment::reservation_id.eq(reservation_id)),
                )
                .execute(connection)?;
                insert_resources(connection, reservation_id, &reservation.resources)?;
                info!("Updated reservation {}", reservation_id);
                Ok(())
            })
    }

    fn set_reservation_status(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
        new_status: models::ReservationStatus,
        timezone: &chrono_tz::Tz,
    ) -> Result<(), StoreError> {
        use schema::reservations::dsl::*;

        self.connection
            .build_transaction()
            .serializable()
            .run(|connection| {
                let previous = load_reservation(connection, reservation_id)?;
                checks::check_status_change_allowed(
                    auth_token,
                    &previous.reservation,
                    new_status,
                )?;
                if previous.reservation.status != models::ReservationStatus::Active {
                    let mut candidate: models::FullNewReservation = previous.into();
                    candidate.reservation.status = new_status;
                    let overlapping =
                        load_overlapping_active_reservations(connection, &candidate)?;
                    checks::check_no_conflict(
                        &candidate,
                        &overlapping,
                        Some(reservation_id),
                        timezone,
                    )?;
                }

                diesel::update(reservations)
                    .filter(id.eq(reservation_id))
                    .set(status.eq(new_status))
                    .execute(connection)?;
                info!(
                    "Changed status of reservation {} to {}",
                    reservation_id,
                    new_status.name()
                );
                Ok(())
            })
    }

    fn import_data(
        &mut self,
        auth_token: &AuthToken,
        data: models::ImportData,
    ) -> Result<models::ImportSummary, StoreError> {
        auth_token.check_privilege(Privilege::ManageUsers)?;
        auth_token.check_privilege(Privilege::ManageInventory)?;
        auth_token.check_privilege(Privilege::ManageAllReservations)?;

        self.connection.transaction(|connection| {
            let mut user_ids = HashMap::new();
            for (old_id, user) in data.users {
                let new_id = diesel::insert_into(schema::users::table)
                    .values(&user)
                    .returning(schema::users::id)
                    .get_result::<UserId>(connection)?;
                user_ids.insert(old_id, new_id);
            }
            let mut room_ids = HashMap::new();
            for (old_id, room) in data.rooms {
                let new_id = diesel::insert_into(schema::rooms::table)
                    .values(&room)
                    .returning(schema::rooms::id)
                    .get_result::<RoomId>(connection)?;
                room_ids.insert(old_id, new_id);
            }
            let mut equipment_ids = HashMap::new();
            for (old_id, item) in data.equipment {
                let new_id = diesel::insert_into(schema::equipment::table)
                    .values(&item)
                    .returning(schema::equipment::id)
                    .get_result::<EquipmentId>(connection)?;
                equipment_ids.insert(old_id, new_id);
            }
            let mut summary = models::ImportSummary {
                users: user_ids.len(),
                rooms: room_ids.len(),
                equipment: equipment_ids.len(),
                reservations: 0,
            };
            for reservation in data.reservations {
                let reservation =
                    checks::translate_import_ids(reservation, &user_ids, &room_ids, &equipment_ids)?;
                checks::check_reservation_data(&reservation)?;
                let new_id = diesel::insert_into(schema::reservations::table)
                    .values(&reservation.reservation)
                    .returning(schema::reservations::id)
                    .get_result::<ReservationId>(connection)?;
                insert_resources(connection, new_id, &reservation.resources)?;
                summary.reservations += 1;
            }
            info!("Imported {:?}", summary);
            Ok(summary)
        })
    }
}

/// Query the room and equipment ids of the given reservations and combine them to
/// [models::FullReservation]s, keeping the order of `the_reservations`.
fn load_resources(
    connection: &mut PgConnection,
    the_reservations: Vec<models::Reservation>,
) -> Result<Vec<models::FullReservation>, StoreError> {
    let the_rooms = models::ReservationRoomMapping::belonging_to(&the_reservations)
        .select(models::ReservationRoomMapping::as_select())
        .load::<models::ReservationRoomMapping>(connection)?
        .grouped_by(&the_reservations);
    let the_equipment = models::ReservationEquipmentMapping::belonging_to(&the_reservations)
        .select(models::ReservationEquipmentMapping::as_select())
        .load::<models::ReservationEquipmentMapping>(connection)?
        .grouped_by(&the_reservations);

    Ok(the_reservations
        .into_iter()
        .zip(the_rooms)
        .zip(the_equipment)
        .map(
            |((reservation, rooms), equipment)| models::FullReservation {
                reservation,
                resources: ResourceSet::new(
                    rooms.into_iter().map(|m| m.room_id),
                    equipment.into_iter().map(|m| m.equipment_id),
                ),
            },
        )
        .collect())
}

fn load_reservation(
    connection: &mut PgConnection,
    reservation_id: ReservationId,
) -> Result<models::FullReservation, StoreError> {
    use schema::reservations::dsl::*;

    let reservation = reservations
        .filter(id.eq(reservation_id))
        .select(models::Reservation::as_select())
        .first::<models::Reservation>(connection)?;
    load_resources(connection, vec![reservation])?
        .pop()
        .ok_or(StoreError::NotExisting)
}

/// Load all active reservations whose time range overlaps with the one of `candidate`. These are
/// the only reservations that may collide with the candidate.
fn load_overlapping_active_reservations(
    connection: &mut PgConnection,
    candidate: &models::FullNewReservation,
) -> Result<Vec<models::FullReservation>, StoreError> {
    use schema::reservations::dsl::*;

    let the_reservations = reservations
        .filter(status.eq(models::ReservationStatus::Active))
        .filter(start.lt(candidate.reservation.end))
        .filter(end.gt(candidate.reservation.start))
        .select(models::Reservation::as_select())
        .load::<models::Reservation>(connection)?;
    load_resources(connection, the_reservations)
}

fn check_resources_bookable(
    connection: &mut PgConnection,
    requested: &ResourceSet,
    previous: Option<&ResourceSet>,
) -> Result<(), StoreError> {
    let the_rooms = schema::rooms::table
        .filter(schema::rooms::id.eq_any(requested.room_ids()))
        .filter(not(schema::rooms::deleted))
        .select(models::Room::as_select())
        .load::<models::Room>(connection)?;
    let the_equipment = schema::equipment::table
        .filter(schema::equipment::id.eq_any(requested.equipment_ids()))
        .filter(not(schema::equipment::deleted))
        .select(models::Equipment::as_select())
        .load::<models::Equipment>(connection)?;
    checks::check_resources_bookable(requested, previous, &the_rooms, &the_equipment)
}

fn insert_resources(
    connection: &mut PgConnection,
    the_reservation_id: ReservationId,
    resources: &ResourceSet,
) -> Result<(), StoreError> {
    let room_mappings: Vec<_> = resources
        .room_ids()
        .iter()
        .map(|room_id| models::ReservationRoomMapping {
            reservation_id: the_reservation_id,
            room_id: *room_id,
        })
        .collect();
    if !room_mappings.is_empty() {
        diesel::insert_into(schema::reservation_rooms::table)
            .values(room_mappings)
            .execute(connection)?;
    }
    let equipment_mappings: Vec<_> = resources
        .equipment_ids()
        .iter()
        .map(|equipment_id| models::ReservationEquipmentMapping {
            reservation_id: the_reservation_id,
            equipment_id: *equipment_id,
        })
        .collect();
    if !equipment_mappings.is_empty() {
        diesel::insert_into(schema::reservation_equipment::table)
            .values(equipment_mappings)
            .execute(connection)?;
    }
    Ok(())
}

/// Escape the wildcard characters of SQL LIKE patterns
fn escape_like_pattern(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
