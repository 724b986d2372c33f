//! Import and export of the complete data set in the json-server `db.json` format of the legacy
//! booking system (Spanish collection and field names).
use crate::booking::ResourceSet;
use crate::cli::CliAuthTokenKey;
use crate::cli_error::CliError;
use crate::data_store::auth_token::AuthToken;
use crate::data_store::models::{self, FullNewReservation, ImportData};
use crate::data_store::password::hash_password;
use crate::data_store::{
    get_store_from_env, ClassyStore, EquipmentId, ReservationFilter, ReservationId, RoomId, UserId,
};
use crate::setup::get_timezone_from_env;
use crate::web::validation::{validate_equipment, validate_room, validate_user};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use classy_api_types::{ReservationStatus, UserRole};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Default)]
struct SavedData {
    #[serde(default)]
    users: Vec<SavedUser>,
    #[serde(default)]
    aulas: Vec<SavedRoom>,
    #[serde(default)]
    material: Vec<SavedEquipment>,
    #[serde(default)]
    reservas: Vec<SavedReservation>,
}

#[derive(Serialize, Deserialize)]
struct SavedUser {
    id: UserId,
    name: String,
    email: String,
    /// Plain text password, as stored by the legacy system. Never exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    role: UserRole,
}

#[derive(Serialize, Deserialize)]
struct SavedRoom {
    id: RoomId,
    nombre: String,
    #[serde(default)]
    tipo: String,
    #[serde(default)]
    capacidad: i32,
    #[serde(default)]
    ubicacion: String,
    #[serde(default = "default_true")]
    disponible: bool,
}

#[derive(Serialize, Deserialize)]
struct SavedEquipment {
    id: EquipmentId,
    nombre: String,
    #[serde(default)]
    codigo: String,
    #[serde(default)]
    barcode: Option<String>,
    #[serde(default)]
    categoria: String,
    #[serde(default)]
    estado: String,
    #[serde(default = "default_true")]
    disponible: bool,
}

#[derive(Serialize, Deserialize)]
struct SavedReservation {
    #[serde(default)]
    id: Option<ReservationId>,
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    es_invitado: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aula_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aula_ids: Vec<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    material_id: Option<EquipmentId>,
    #[serde(default, alias = "materiales", skip_serializing_if = "Vec::is_empty")]
    material_ids: Vec<EquipmentId>,
    fecha_inicio: String,
    fecha_fin: String,
    #[serde(default = "default_status")]
    estado: ReservationStatus,
    #[serde(default)]
    observaciones: String,
}

fn default_true() -> bool {
    true
}

fn default_status() -> ReservationStatus {
    ReservationStatus::Active
}

/// Import all users, rooms, equipment and reservations from a `db.json` file in a single
/// transaction.
///
/// Plain text passwords are hashed. Reservations are imported as they are, without checking them
/// for double bookings. Use `check-conflicts` afterwards to find them.
pub fn load_data_from_file(path: &PathBuf) -> Result<(), CliError> {
    let timezone = get_timezone_from_env()?;
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let f = File::open(path).map_err(|e| {
        CliError::FileError(format!("Could not open {:?} for reading: {}", path, e))
    })?;
    let data: SavedData = serde_json::from_reader(BufReader::new(f))?;
    let import_data = convert_saved_data(data, &timezone)?;

    let auth_key = CliAuthTokenKey::new();
    let auth_token = AuthToken::create_for_cli(&auth_key);
    let summary = data_store.import_data(&auth_token, import_data)?;
    println!(
        "Imported {} users, {} rooms, {} equipment items and {} reservations.",
        summary.users, summary.rooms, summary.equipment, summary.reservations
    );

    Ok(())
}

/// Export all users (without password), rooms, equipment and reservations into a `db.json` file,
/// which can be read by [load_data_from_file].
pub fn export_data_to_file(path: &PathBuf) -> Result<(), CliError> {
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let auth_key = CliAuthTokenKey::new();
    let auth_token = AuthToken::create_for_cli(&auth_key);

    let data = SavedData {
        users: data_store
            .get_users(&auth_token)?
            .into_iter()
            .map(|u| u.into())
            .collect(),
        aulas: data_store
            .get_rooms(&auth_token)?
            .into_iter()
            .map(|r| SavedRoom {
                id: r.id,
                nombre: r.name,
                tipo: r.room_type,
                capacidad: r.capacity,
                ubicacion: r.location,
                disponible: r.available,
            })
            .collect(),
        material: data_store
            .get_equipment()?
            .into_iter()
            .map(|e| SavedEquipment {
                id: e.id,
                nombre: e.name,
                codigo: e.code,
                barcode: e.barcode,
                categoria: e.category,
                estado: e.condition,
                disponible: e.available,
            })
            .collect(),
        reservas: data_store
            .get_reservations_filtered(&auth_token, ReservationFilter::default())?
            .into_iter()
            .map(|r| SavedReservation {
                id: Some(r.reservation.id),
                user_id: r.reservation.user_id,
                es_invitado: r.reservation.user_id.is_none(),
                aula_id: None,
                aula_ids: r.resources.room_ids().to_vec(),
                material_id: None,
                material_ids: r.resources.equipment_ids().to_vec(),
                fecha_inicio: r.reservation.start.to_rfc3339(),
                fecha_fin: r.reservation.end.to_rfc3339(),
                estado: r.reservation.status.into(),
                observaciones: r.reservation.notes,
            })
            .collect(),
    };

    let f = File::create(path).map_err(|e| {
        CliError::FileError(format!(
            "Could not create or open {:?} for writing: {}",
            path, e
        ))
    })?;
    serde_json::to_writer_pretty(BufWriter::new(f), &data)?;
    info!(
        "Exported {} reservations to {:?}",
        data.reservas.len(),
        path
    );

    Ok(())
}

fn convert_saved_data(data: SavedData, timezone: &chrono_tz::Tz) -> Result<ImportData, CliError> {
    let mut result = ImportData::default();
    for user in data.users {
        let password = user.password;
        let mut new_user = validate_user(
            classy_api_types::NewUser {
                name: user.name,
                email: user.email,
                role: user.role,
                password: None,
            },
            false,
        )
        .map_err(|e| CliError::DataError(format!("User {}: {}", user.id, e)))?;
        // Legacy passwords are taken over without the length rule of new passwords. Users
        // without password cannot log in until an admin sets one.
        new_user.password_hash = Some(match password.filter(|p| !p.is_empty()) {
            Some(password) => hash_password(&password)
                .map_err(|e| CliError::DataError(format!("User {}: {}", user.id, e)))?,
            None => String::new(),
        });
        result.users.push((user.id, new_user));
    }
    for room in data.aulas {
        let new_room = validate_room(classy_api_types::NewRoom {
            name: room.nombre,
            room_type: room.tipo,
            capacity: room.capacidad,
            location: room.ubicacion,
            available: room.disponible,
        })
        .map_err(|e| CliError::DataError(format!("Room {}: {}", room.id, e)))?;
        result.rooms.push((room.id, new_room));
    }
    for item in data.material {
        let new_item = validate_equipment(classy_api_types::NewEquipment {
            name: item.nombre,
            code: item.codigo,
            barcode: item.barcode,
            category: item.categoria,
            condition: item.estado,
            available: item.disponible,
        })
        .map_err(|e| CliError::DataError(format!("Equipment item {}: {}", item.id, e)))?;
        result.equipment.push((item.id, new_item));
    }
    for (index, reservation) in data.reservas.into_iter().enumerate() {
        let name = match reservation.id {
            Some(id) => format!("Reservation {}", id),
            None => format!("Reservation #{}", index + 1),
        };
        let start = parse_legacy_timestamp(&reservation.fecha_inicio, timezone)
            .map_err(|e| CliError::DataError(format!("{}: {}", name, e)))?;
        let end = parse_legacy_timestamp(&reservation.fecha_fin, timezone)
            .map_err(|e| CliError::DataError(format!("{}: {}", name, e)))?;
        result.reservations.push(FullNewReservation {
            reservation: models::NewReservation {
                user_id: if reservation.es_invitado {
                    None
                } else {
                    reservation.user_id
                },
                start,
                end,
                status: reservation.estado.into(),
                notes: reservation.observaciones.trim().to_owned(),
            },
            resources: ResourceSet::new(
                reservation
                    .aula_id
                    .into_iter()
                    .chain(reservation.aula_ids),
                reservation
                    .material_id
                    .into_iter()
                    .chain(reservation.material_ids),
            ),
        });
    }
    Ok(result)
}

/// Parse a timestamp of the legacy system. Timestamps with UTC offset are taken as they are,
/// timestamps without offset (as entered in the browser's `datetime-local` inputs) are
/// interpreted in the local `timezone` of the school.
fn parse_legacy_timestamp(value: &str, timezone: &chrono_tz::Tz) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| format!("Invalid timestamp '{}': {}", value, e))?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| format!("Timestamp '{}' does not exist in {}", value, timezone))
}

impl From<models::User> for SavedUser {
    fn from(value: models::User) -> Self {
        SavedUser {
            id: value.id,
            name: value.name,
            email: value.email,
            password: None,
            role: value.role.into(),
        }
    }
}
