//! The backend part of the backend: the database interface
//!
//! The primary entry point to this module is the function [get_store_from_env], which returns an
//! object implementing the [ClassyStore] trait. This object can be shared between threads in a
//! global application state and be used to create [ClassyStoreFacade] instances for interaction
//! with the database. These provide a CRUD-like interface, using the data models from the [models]
//! module.
//!
//! The primary implementation of [ClassyStore] ([postgres::PgDataStore]) wraps a PostgreSQL
//! connection pool and its corresponding [ClassyStoreFacade] objects hold a reference to one
//! pooled connection each, using the Diesel query DSL for implementing the database interaction.
//!
//! There is also a mock implementation for unittests.
//!
//! Both implementations refuse to store double bookings: Before writing an active reservation,
//! they check it with [crate::booking::validate] against the current reservations and return
//! [StoreError::ReservationConflict] on a collision.

use crate::auth_session::SessionToken;
use crate::cli_error::CliError;
use crate::data_store::auth_token::Privilege;
use crate::setup;
use auth_token::AuthToken;
use std::fmt::{Debug, Display, Formatter};

pub mod auth_token;
mod checks;
pub mod models;
pub mod password;
mod postgres;
mod schema;
#[cfg(test)]
pub mod store_mock;

/// Get a [ClassyStore] instance, according the "DATABASE_URL" environment variable.
///
/// The DATABASE_URL must be a PosgreSQL connection url, following the schema
/// "postgres://{user}:{password}@{host}/{database}".
pub fn get_store_from_env() -> Result<impl ClassyStore, CliError> {
    Ok(postgres::PgDataStore::new(
        &setup::get_database_url_from_env()?,
    )?)
}

pub type UserId = i32;
pub type RoomId = i32;
pub type EquipmentId = i32;
pub type ReservationId = i32;

pub trait ClassyStoreFacade {
    /// Check the given credentials and, on success, register `session_token` as a new session of
    /// the user.
    ///
    /// Returns [StoreError::AuthenticationFailed] for an unknown email address as well as for a
    /// wrong password.
    fn authenticate_with_password(
        &mut self,
        email: &str,
        password: &str,
        session_token: &SessionToken,
    ) -> Result<models::User, StoreError>;

    /// Get an [AuthToken] for the user of the client session. Sessions older than `max_age` are
    /// not valid anymore.
    fn get_auth_token_for_session(
        &mut self,
        session_token: &SessionToken,
        max_age: chrono::Duration,
    ) -> Result<AuthToken, StoreError>;

    /// Delete the client session. Unknown sessions are ignored.
    fn logout(&mut self, session_token: &SessionToken) -> Result<(), StoreError>;

    fn get_users(&mut self, auth_token: &AuthToken) -> Result<Vec<models::User>, StoreError>;
    /// Get a single user. Each user may get their own record, other users' records require the
    /// [Privilege::ManageUsers] privilege.
    fn get_user(
        &mut self,
        auth_token: &AuthToken,
        user_id: UserId,
    ) -> Result<models::User, StoreError>;
    fn create_user(
        &mut self,
        auth_token: &AuthToken,
        user: models::NewUser,
    ) -> Result<UserId, StoreError>;
    fn update_user(
        &mut self,
        auth_token: &AuthToken,
        user_id: UserId,
        user: models::NewUser,
    ) -> Result<(), StoreError>;
    /// Delete a user and their sessions. Their reservations are kept as guest bookings.
    fn delete_user(&mut self, auth_token: &AuthToken, user_id: UserId) -> Result<(), StoreError>;

    /// Get all rooms, which have not been deleted, sorted by name.
    fn get_rooms(&mut self, auth_token: &AuthToken) -> Result<Vec<models::Room>, StoreError>;
    fn get_room(
        &mut self,
        auth_token: &AuthToken,
        room_id: RoomId,
    ) -> Result<models::Room, StoreError>;
    fn create_room(
        &mut self,
        auth_token: &AuthToken,
        room: models::NewRoom,
    ) -> Result<RoomId, StoreError>;
    fn update_room(
        &mut self,
        auth_token: &AuthToken,
        room_id: RoomId,
        room: models::NewRoom,
    ) -> Result<(), StoreError>;
    /// Mark the room as deleted. Existing reservations keep referencing it.
    fn delete_room(&mut self, auth_token: &AuthToken, room_id: RoomId) -> Result<(), StoreError>;

    /// Get all equipment items, which have not been deleted, sorted by name.
    ///
    /// The equipment list is public, so no authorization is required.
    fn get_equipment(&mut self) -> Result<Vec<models::Equipment>, StoreError>;
    fn get_equipment_item(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
    ) -> Result<models::Equipment, StoreError>;
    fn get_equipment_by_barcode(
        &mut self,
        auth_token: &AuthToken,
        barcode: &str,
    ) -> Result<models::Equipment, StoreError>;
    /// Search equipment items by a case-insensitive substring of their name, code or category.
    fn search_equipment(
        &mut self,
        auth_token: &AuthToken,
        query: &str,
    ) -> Result<Vec<models::Equipment>, StoreError>;
    fn create_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment: models::NewEquipment,
    ) -> Result<EquipmentId, StoreError>;
    fn update_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
        equipment: models::NewEquipment,
    ) -> Result<(), StoreError>;
    /// Mark the equipment item as deleted. Existing reservations keep referencing it.
    fn delete_equipment(
        &mut self,
        auth_token: &AuthToken,
        equipment_id: EquipmentId,
    ) -> Result<(), StoreError>;

    /// Get a filtered list of reservations
    ///
    /// Reservations are returned in chronological order, i.e. sorted by (start, id)
    fn get_reservations_filtered(
        &mut self,
        auth_token: &AuthToken,
        filter: ReservationFilter,
    ) -> Result<Vec<models::FullReservation>, StoreError>;
    fn get_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
    ) -> Result<models::FullReservation, StoreError>;
    /// Create a new reservation.
    ///
    /// Users without [Privilege::ManageAllReservations] can only create active reservations for
    /// themselves. All referenced resources must exist and be available. An active reservation is
    /// checked for double bookings atomically with the write; conflict messages render times in
    /// `timezone`.
    fn create_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation: models::FullNewReservation,
        timezone: &chrono_tz::Tz,
    ) -> Result<ReservationId, StoreError>;
    /// Replace the data of an existing reservation.
    ///
    /// Same rules as for [ClassyStoreFacade::create_reservation]. Additionally, the status
    /// change must be allowed (see [crate::booking::status::check_transition]) and only the owner
    /// or users with [Privilege::ManageAllReservations] may edit a reservation.
    fn update_reservation(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
        reservation: models::FullNewReservation,
        timezone: &chrono_tz::Tz,
    ) -> Result<(), StoreError>;
    /// Change only the status of a reservation, e.g. for cancelling or returning it.
    fn set_reservation_status(
        &mut self,
        auth_token: &AuthToken,
        reservation_id: ReservationId,
        status: models::ReservationStatus,
        timezone: &chrono_tz::Tz,
    ) -> Result<(), StoreError>;

    /// Import users, inventory and reservations in a single transaction, without checking the
    /// reservations for conflicts.
    fn import_data(
        &mut self,
        auth_token: &AuthToken,
        data: models::ImportData,
    ) -> Result<models::ImportSummary, StoreError>;
}

/// Filter options for retrieving reservations from the store via
/// ClassyStoreFacade::get_reservations_filtered()
#[derive(Default, Clone, Debug)]
pub struct ReservationFilter {
    /// Filter for reservations requested by the given user
    pub user_id: Option<UserId>,
    /// Filter for reservations with the given status
    pub status: Option<models::ReservationStatus>,
    /// Filter for reservations that end after the given point in time (this includes
    /// reservations that span over this point in time)
    pub after: Option<chrono::DateTime<chrono::Utc>>,
    /// Filter for reservations that begin before the given point in time (this includes
    /// reservations that span over this point in time)
    pub before: Option<chrono::DateTime<chrono::Utc>>,
}

impl ReservationFilter {
    /// Checks if a given reservation matches the filter
    ///
    /// Usually, filtering should be done by the database. This function can be used for separate
    /// checks of individual reservations in software.
    pub fn matches(&self, reservation: &models::FullReservation) -> bool {
        let reservation = &reservation.reservation;
        if self.user_id.is_some() && reservation.user_id != self.user_id {
            return false;
        }
        if let Some(status) = self.status {
            if reservation.status != status {
                return false;
            }
        }
        if let Some(after) = self.after {
            if after >= reservation.end {
                return false;
            }
        }
        if let Some(before) = self.before {
            if before <= reservation.start {
                return false;
            }
        }
        true
    }
}

pub trait ClassyStore: Send + Sync {
    fn get_facade<'a>(&'a self) -> Result<Box<dyn ClassyStoreFacade + 'a>, StoreError>;
}

pub struct EnumMemberNotExistingError {
    pub member_value: i32,
    pub enum_name: &'static str,
}

impl Display for EnumMemberNotExistingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} is not a valid value for {} enum",
            self.member_value, self.enum_name
        )
    }
}

#[derive(Debug)]
pub enum StoreError {
    /// Connection the database failed. See string description for details.
    ConnectionError(String),
    /// The query could not be executed because of some error not covered by the other members (see
    /// string description)
    QueryError(diesel::result::Error),
    /// Database transaction could not be commited due to a conflicting concurrent transaction
    TransactionConflict,
    /// The requested entity does not exist
    NotExisting,
    /// The entity could not be created because it already exists (e.g. a user with the same email
    /// address)
    ConflictEntityExists,
    /// The client is not authorized for this action. It would need to authenticate as a user with
    /// a role qualifying for the `required_privilege`.
    PermissionDenied { required_privilege: Privilege },
    /// Login failed, due to an unknown email address or a wrong password
    AuthenticationFailed,
    /// The client's session does not exist (anymore) or has expired
    InvalidSession,
    /// The reservation would collide with an existing active reservation
    ReservationConflict {
        message: String,
        conflicting_reservation: ReservationId,
    },
    /// The provided data is invalid, i.e. it does not match the expected ranges or violates a
    /// SQL constraint. See string description for details.
    InvalidInputData(String),
    /// Some data queried from the database could not be deserialized. See string description for
    /// details.
    InvalidDataInDatabase(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => Self::NotExisting,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => Self::ConflictEntityExists,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::SerializationFailure,
                _,
            ) => Self::TransactionConflict,
            diesel::result::Error::DatabaseError(
                e @ diesel::result::DatabaseErrorKind::ForeignKeyViolation
                | e @ diesel::result::DatabaseErrorKind::CheckViolation,
                _,
            ) => Self::InvalidInputData(format!("{:?}", e)),
            diesel::result::Error::SerializationError(e) => Self::InvalidInputData(e.to_string()),
            diesel::result::Error::DeserializationError(e) => {
                Self::InvalidDataInDatabase(e.to_string())
            }
            _ => Self::QueryError(error),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(error: r2d2::Error) -> Self {
        Self::ConnectionError(error.to_string())
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionError(e) => write!(f, "Error connecting to database: {}", e),
            Self::QueryError(e) => write!(f, "Error while executing database query: {}", e),
            Self::TransactionConflict => f.write_str("Database transaction could not be commited due to a conflicting concurrent transaction"),
            Self::NotExisting => f.write_str("Database record does not exist."),
            Self::ConflictEntityExists => f.write_str("Database record exists already."),
            Self::PermissionDenied { required_privilege } => {
                write!(f, "Client is not authorized to perform this action. {:?} privilege required.", required_privilege)
            }
            Self::AuthenticationFailed => f.write_str("Invalid email address or password."),
            Self::InvalidSession => f.write_str("Session is not valid or has expired."),
            Self::ReservationConflict { message, .. } => f.write_str(message),
            Self::InvalidInputData(e) => {
                write!(f, "Data to be stored in database is not valid: {}", e)
            }
            Self::InvalidDataInDatabase(e) => {
                write!(f, "Data queried from database could not be deserialized: {}", e)
            }
        }
    }
}

impl std::error::Error for StoreError {}
