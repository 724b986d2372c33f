use crate::cli::util::{query_user, query_user_and_check, query_user_bool};
use crate::cli::CliAuthTokenKey;
use crate::cli_error::CliError;
use crate::data_store::auth_token::{AccessRole, AuthToken};
use crate::data_store::models::NewUser;
use crate::data_store::password::hash_password;
use crate::data_store::{get_store_from_env, ClassyStore};
use crate::web::validation::{validate_email, validate_password};

/// Interactively create a new user account, e.g. the first administrator of a fresh database.
pub fn create_user() -> Result<(), CliError> {
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let name: String = query_user_and_check("Enter name", |name: &String| {
        if name.is_empty() {
            Err("The name is required.")
        } else {
            Ok(())
        }
    });
    let email: String = query_user_and_check("Enter email address", |email: &String| {
        validate_email(email).map(|_| ())
    });
    let role: AccessRole = query_user("Enter role (student, teacher, admin)");
    let password: String = query_user_and_check("Enter password", |password: &String| {
        validate_password(password)
    });

    println!("Creating {} user {} <{}>", role.name(), name, email);
    if !query_user_bool("Continue?", Some(true)) {
        return Ok(());
    }

    let auth_key = CliAuthTokenKey::new();
    let auth_token = AuthToken::create_for_cli(&auth_key);
    let new_user_id = data_store.create_user(
        &auth_token,
        NewUser {
            name,
            email: validate_email(&email).map_err(|e| CliError::DataError(e.to_string()))?,
            role,
            password_hash: Some(
                hash_password(&password).map_err(|e| CliError::DataError(e.to_string()))?,
            ),
        },
    )?;
    println!("Success. New user id: {}", new_user_id);

    Ok(())
}
