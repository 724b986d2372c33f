use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[serde(alias = "alumno")]
    Student,
    #[serde(alias = "profesor")]
    Teacher,
    Admin,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating or updating a user.
///
/// When updating, an empty or missing password keeps the current one.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Room {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub capacity: i32,
    pub location: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewRoom {
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub capacity: i32,
    pub location: String,
    #[serde(default = "default_true")]
    pub available: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub category: String,
    pub condition: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewEquipment {
    pub name: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub category: String,
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default = "default_true")]
    pub available: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[serde(alias = "pendiente")]
    Pending,
    #[serde(alias = "activa")]
    Active,
    #[serde(alias = "cancelada")]
    Cancelled,
    #[serde(alias = "devuelta", alias = "completada")]
    Completed,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Reservation {
    pub id: i32,
    /// `None` for guest bookings
    pub user_id: Option<i32>,
    pub room_ids: Vec<i32>,
    pub equipment_ids: Vec<i32>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// A nested resource object, as sent by clients which embed the full room or equipment record
/// into the reservation. Only the id is evaluated.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResourceRef {
    pub id: i32,
}

/// Request body for creating, updating or checking a reservation.
///
/// Resources may be referenced in any of the supported shapes: single ids (`room_id`,
/// `equipment_id`), id lists (`room_ids`, `equipment_ids`) or nested objects (`room`,
/// `equipment`). The Spanish field names (`aula_id`, `material_ids`, `fecha_inicio`, …) are
/// accepted as aliases of the English ones.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NewReservation {
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default, alias = "es_invitado")]
    pub guest: bool,

    #[serde(default, alias = "aula_id", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<i32>,
    #[serde(default, alias = "aula_ids", skip_serializing_if = "Vec::is_empty")]
    pub room_ids: Vec<i32>,
    #[serde(default, alias = "aula", skip_serializing_if = "Option::is_none")]
    pub room: Option<ResourceRef>,
    #[serde(default, alias = "material_id", skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<i32>,
    #[serde(default, alias = "material_ids", skip_serializing_if = "Vec::is_empty")]
    pub equipment_ids: Vec<i32>,
    #[serde(default, alias = "materials", skip_serializing_if = "Vec::is_empty")]
    pub equipment: Vec<ResourceRef>,

    #[serde(
        default,
        alias = "fecha_inicio",
        deserialize_with = "deserialize_optional_timestamp"
    )]
    pub start: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "fecha_fin",
        deserialize_with = "deserialize_optional_timestamp"
    )]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, alias = "estado", skip_serializing_if = "Option::is_none")]
    pub status: Option<ReservationStatus>,
    #[serde(default, alias = "observaciones")]
    pub notes: String,
}

/// Result of checking a reservation candidate for conflicts with existing reservations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReservationCheck {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        rename = "conflictingReservation",
        skip_serializing_if = "Option::is_none"
    )]
    pub conflicting_reservation: Option<i32>,
}

#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn default_true() -> bool {
    true
}

fn default_condition() -> String {
    "Good".to_owned()
}

/// Booking forms send an empty string for a time which has not been selected yet.
fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<DateTime<Utc>>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
