//! Checks for user-provided user and inventory records, shared by the REST API and the CLI

use crate::data_store::auth_token::AccessRole;
use crate::data_store::models;
use crate::data_store::password::hash_password;
use lazy_static::lazy_static;
use std::fmt::{Display, Formatter};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

fn required(value: &str, message: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError(message.to_owned()))
    } else {
        Ok(value.to_owned())
    }
}

/// Normalize an email address to its trimmed, lowercase form and check its rough syntax.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    lazy_static! {
        static ref RE: regex::Regex = regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    }
    let email = required(email, "The email address is required.")?.to_lowercase();
    if !RE.is_match(&email) {
        return Err(ValidationError("The email address is not valid.".to_owned()));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError("The password is required.".to_owned()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError(format!(
            "The password must have at least {} characters.",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Check a user record and hash its password.
///
/// The password is required when creating a user (`is_new`). When updating, an empty password
/// keeps the current one.
pub fn validate_user(
    user: classy_api_types::NewUser,
    is_new: bool,
) -> Result<models::NewUser, ValidationError> {
    let name = required(&user.name, "The name is required.")?;
    let email = validate_email(&user.email)?;
    let password = user.password.filter(|p| !p.is_empty() || is_new);
    let password_hash = match password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password).map_err(|e| ValidationError(e.to_string()))?)
        }
        None if is_new => return Err(ValidationError("The password is required.".to_owned())),
        None => None,
    };
    Ok(models::NewUser {
        name,
        email,
        role: AccessRole::from(user.role),
        password_hash,
    })
}

pub fn validate_room(room: classy_api_types::NewRoom) -> Result<models::NewRoom, ValidationError> {
    let name = required(&room.name, "The name is required.")?;
    let room_type = required(&room.room_type, "The room type is required.")?;
    if room.capacity <= 0 {
        return Err(ValidationError(
            "The capacity must be a number greater than 0.".to_owned(),
        ));
    }
    let location = required(&room.location, "The location is required.")?;
    Ok(models::NewRoom {
        name,
        room_type,
        capacity: room.capacity,
        location,
        available: room.available,
    })
}

pub fn validate_equipment(
    equipment: classy_api_types::NewEquipment,
) -> Result<models::NewEquipment, ValidationError> {
    let mut result = models::NewEquipment::from(equipment);
    result.name = required(&result.name, "The name is required.")?;
    result.code = required(&result.code, "The code is required.")?;
    result.category = required(&result.category, "The category is required.")?;
    result.barcode = result.barcode.map(|b| b.trim().to_owned());
    if result.condition.trim().is_empty() {
        result.condition = "Good".to_owned();
    }
    Ok(result)
}
