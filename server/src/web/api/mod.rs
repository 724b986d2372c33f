use std::fmt::Display;

mod endpoints_auth;
mod endpoints_equipment;
mod endpoints_reservation;
mod endpoints_room;
mod endpoints_user;
#[cfg(test)]
mod tests;

use crate::auth_session::SessionToken;
use crate::data_store::auth_token::Privilege;
use crate::data_store::{ReservationId, StoreError};
use crate::web::validation::ValidationError;
use actix_web::error::JsonPayloadError;
use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    web, HttpResponse,
};
use serde_json::json;

pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(get_api_service());
}

fn get_api_service() -> actix_web::Scope {
    let json_config =
        web::JsonConfig::default().error_handler(|err, _req| APIError::InvalidJson(err).into());
    web::scope("/api")
        .app_data(json_config)
        .service(endpoints_auth::login)
        .service(endpoints_auth::logout)
        .service(endpoints_auth::current_user)
        .service(endpoints_reservation::list_reservations)
        .service(endpoints_reservation::check_reservation)
        .service(endpoints_reservation::get_reservation)
        .service(endpoints_reservation::create_reservation)
        .service(endpoints_reservation::update_reservation)
        .service(endpoints_reservation::cancel_reservation)
        .service(endpoints_reservation::return_reservation)
        .service(endpoints_room::list_rooms)
        .service(endpoints_room::get_room)
        .service(endpoints_room::create_room)
        .service(endpoints_room::update_room)
        .service(endpoints_room::delete_room)
        .service(endpoints_equipment::list_equipment)
        .service(endpoints_equipment::search_equipment)
        .service(endpoints_equipment::get_equipment_by_barcode)
        .service(endpoints_equipment::get_equipment_item)
        .service(endpoints_equipment::create_equipment)
        .service(endpoints_equipment::update_equipment)
        .service(endpoints_equipment::delete_equipment)
        .service(endpoints_user::list_users)
        .service(endpoints_user::get_user)
        .service(endpoints_user::create_user)
        .service(endpoints_user::update_user)
        .service(endpoints_user::delete_user)
}

#[derive(Debug)]
pub enum APIError {
    NotExisting,
    AlreadyExisting,
    PermissionDenied {
        required_privilege: Privilege,
    },
    NoSessionToken,
    InvalidSessionToken,
    AuthenticationFailed,
    InvalidJson(actix_web::error::JsonPayloadError),
    InvalidData(String),
    ReservationConflict {
        message: String,
        conflicting_reservation: ReservationId,
    },
    TransactionConflict,
    InternalError(String),
}

impl Display for APIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotExisting => f.write_str("Element does not exist")?,
            Self::AlreadyExisting => {
                f.write_str("Element already exists")?;
            },
            Self::PermissionDenied{required_privilege} => {
                write!(f, "Client is not authorized to perform this action. Authentication as {} is required.",
                       required_privilege
                           .qualifying_roles()
                           .iter()
                           .map(|role| role.name().to_owned())
                           .collect::<Vec<String>>()
                           .join(" or "))?;
            },
            Self::NoSessionToken => {
                f.write_str("This action requires authentication, but client did not send authentication session token.")?
            },
            Self::InvalidSessionToken => {
                f.write_str("This action requires authentication, but the session token given by the client is not valid or has expired.")?
            },
            Self::AuthenticationFailed => {
                f.write_str("Invalid email address or password.")?;
            }
            Self::InternalError(s) => {
                f.write_str("Internal error: ")?;
                f.write_str(s)?;
            },
            Self::InvalidJson(e) => {
                write!(f, "Invalid JSON request data: {}", e)?;
            },
            Self::InvalidData(e) => {
                f.write_str(e)?;
            },
            Self::ReservationConflict { message, .. } => {
                f.write_str(message)?;
            },
            Self::TransactionConflict => {
                f.write_str("Concurrent database transaction conflict. Please retry request.")?;
            },
        };
        Ok(())
    }
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse {
        let message = format!("{}", self);

        let body = match self {
            Self::ReservationConflict {
                conflicting_reservation,
                ..
            } => json!({
                "httpCode": self.status_code().as_u16(),
                "message": message,
                "conflictingReservation": conflicting_reservation,
            }),
            _ => json!({
                "httpCode": self.status_code().as_u16(),
                "message": message
            }),
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(body)
    }
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotExisting => StatusCode::NOT_FOUND,
            Self::AlreadyExisting => StatusCode::CONFLICT,
            Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Self::NoSessionToken => StatusCode::UNAUTHORIZED,
            Self::InvalidSessionToken => StatusCode::UNAUTHORIZED,
            Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidJson(e) => match e {
                JsonPayloadError::ContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                JsonPayloadError::Deserialize(json_error) if json_error.is_data() => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::BAD_REQUEST,
            },
            Self::InvalidData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ReservationConflict { .. } => StatusCode::CONFLICT,
            Self::TransactionConflict => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConnectionError(error) => {
                Self::InternalError(format!("Could not connect to database: {}", error))
            }
            StoreError::QueryError(diesel_error) => Self::InternalError(format!(
                "Error while executing database query: {}",
                diesel_error
            )),
            StoreError::TransactionConflict => Self::TransactionConflict,
            StoreError::NotExisting => Self::NotExisting,
            StoreError::ConflictEntityExists => Self::AlreadyExisting,
            StoreError::PermissionDenied { required_privilege } => {
                Self::PermissionDenied { required_privilege }
            }
            StoreError::AuthenticationFailed => Self::AuthenticationFailed,
            StoreError::InvalidSession => Self::InvalidSessionToken,
            StoreError::ReservationConflict {
                message,
                conflicting_reservation,
            } => Self::ReservationConflict {
                message,
                conflicting_reservation,
            },
            StoreError::InvalidInputData(e) => Self::InvalidData(e),
            StoreError::InvalidDataInDatabase(e) => Self::InternalError(format!(
                "Data queried from database could not be deserialized: {}",
                e
            )),
        }
    }
}

impl From<actix_web::error::BlockingError> for APIError {
    fn from(_e: actix_web::error::BlockingError) -> Self {
        APIError::InternalError(
            "Could not get thread from thread pool for synchronous database operation.".to_owned(),
        )
    }
}

impl From<crate::auth_session::SessionError> for APIError {
    fn from(e: crate::auth_session::SessionError) -> Self {
        match e {
            crate::auth_session::SessionError::InvalidTokenFormat => APIError::InvalidSessionToken,
            crate::auth_session::SessionError::RandomGeneratorFailed => {
                APIError::InternalError(e.to_string())
            }
        }
    }
}

impl From<ValidationError> for APIError {
    fn from(e: ValidationError) -> Self {
        APIError::InvalidData(e.0)
    }
}

impl From<crate::booking::FieldError> for APIError {
    fn from(e: crate::booking::FieldError) -> Self {
        APIError::InvalidData(e.to_string())
    }
}

/// The `Authorization: Bearer <token>` header, carrying the client's session token
struct BearerTokenHeader(String);

impl BearerTokenHeader {
    fn session_token(&self) -> Result<SessionToken, crate::auth_session::SessionError> {
        SessionToken::from_string(&self.0)
    }
}

impl actix_web::http::header::TryIntoHeaderValue for BearerTokenHeader {
    type Error = actix_web::http::header::InvalidHeaderValue;

    fn try_into_value(self) -> Result<actix_web::http::header::HeaderValue, Self::Error> {
        format!("Bearer {}", self.0).parse()
    }
}

impl actix_web::http::header::Header for BearerTokenHeader {
    fn name() -> actix_web::http::header::HeaderName {
        actix_web::http::header::AUTHORIZATION
    }

    fn parse<M: actix_web::HttpMessage>(msg: &M) -> Result<Self, actix_web::error::ParseError> {
        let value = msg
            .headers()
            .get(Self::name())
            .ok_or(actix_web::error::ParseError::Header)?
            .to_str()
            .map_err(|_| actix_web::error::ParseError::Header)?;
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or(actix_web::error::ParseError::Header)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(actix_web::error::ParseError::Header);
        }
        Ok(Self(token.trim().to_owned()))
    }
}

/// Extract the client's session token from the optional Authorization header of a request to an
/// endpoint, which requires authentication.
fn require_session_token(
    header: Option<actix_web::web::Header<BearerTokenHeader>>,
) -> Result<SessionToken, APIError> {
    Ok(header
        .ok_or(APIError::NoSessionToken)?
        .into_inner()
        .session_token()?)
}
