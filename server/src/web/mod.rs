use crate::cli_error::CliError;
use crate::data_store::{get_store_from_env, ClassyStore};
use crate::setup::{
    get_listen_address_from_env, get_listen_port_from_env, get_session_max_age_from_env,
    get_timezone_from_env,
};
use actix_web::{middleware, web, App, HttpServer};
use log::info;
use std::sync::Arc;

mod api;
mod cache;
mod http_error_logging;
mod util;
pub(crate) mod validation;

pub fn serve() -> Result<(), CliError> {
    let state = AppState::new()?;
    let address = get_listen_address_from_env()?;
    let port = get_listen_port_from_env()?;
    info!(
        "Starting classy {} at {}:{} (timezone {})",
        crate::get_version(),
        address,
        port,
        state.timezone
    );
    actix_web::rt::System::new()
        .block_on(
            HttpServer::new(move || {
                App::new()
                    .configure(api::configure_app)
                    .app_data(web::Data::new(state.clone()))
                    .wrap(middleware::from_fn(
                        http_error_logging::error_logging_middleware,
                    ))
                    .wrap(middleware::Compress::default())
            })
            .bind((address, port))
            .map_err(CliError::BindError)?
            .run(),
        )
        .map_err(CliError::ServerError)
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ClassyStore>,
    /// Local timezone of the school, for rendering times in conflict messages
    timezone: chrono_tz::Tz,
    session_max_age: chrono::Duration,
    caches: Arc<cache::Caches>,
}

impl AppState {
    pub fn new() -> Result<Self, CliError> {
        Ok(Self {
            store: Arc::new(get_store_from_env()?),
            timezone: get_timezone_from_env()?,
            session_max_age: get_session_max_age_from_env()?,
            caches: Arc::new(cache::Caches::default()),
        })
    }
}
