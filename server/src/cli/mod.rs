pub mod database_migration;
pub mod file_io;
pub mod manage_reservations;
pub mod manage_users;
mod util;

/// Key for creating an [crate::data_store::auth_token::AuthToken] with full privileges.
///
/// Can only be constructed in the command line interface code, which keeps the web server from
/// acquiring privileges without a valid user session.
pub struct CliAuthTokenKey {
    _private: (),
}

impl CliAuthTokenKey {
    #[allow(clippy::new_without_default)] // We always want to explicitly create these objects
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}
