use crate::web::api::APIError;
use log::{error, warn};

pub async fn error_logging_middleware<B: actix_web::body::MessageBody>(
    req: actix_web::dev::ServiceRequest,
    next: actix_web::middleware::Next<B>,
) -> Result<actix_web::dev::ServiceResponse<B>, actix_web::Error> {
    let response = next.call(req).await?;

    if let Some(error) = response.response().error() {
        if let Some(api_error) = error.as_error::<APIError>() {
            let client = response
                .request()
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_owned();
            match api_error {
                APIError::PermissionDenied { required_privilege } => {
                    warn!(
                        "HTTP {} permission denied at <{}>. Client: <{}> Requires privilege: {:?}",
                        response.response().status(),
                        response.request().uri(),
                        client,
                        required_privilege,
                    );
                }
                APIError::NoSessionToken => {
                    warn!(
                        "HTTP {} permission denied at <{}>. Client: <{}> Cause: No session token",
                        response.response().status(),
                        response.request().uri(),
                        client,
                    );
                }
                APIError::InvalidSessionToken => {
                    warn!(
                        "HTTP {} invalid session token. Client: <{}>",
                        response.response().status(),
                        client,
                    );
                }
                APIError::AuthenticationFailed => {
                    warn!(
                        "HTTP {} authentication failed. Client: <{}>",
                        response.response().status(),
                        client,
                    );
                }
                APIError::ReservationConflict {
                    conflicting_reservation,
                    ..
                } => {
                    warn!(
                        "HTTP {} double booking refused at <{}>. Conflicts with reservation {}",
                        response.response().status(),
                        response.request().uri(),
                        conflicting_reservation,
                    );
                }
                APIError::NotExisting
                | APIError::AlreadyExisting
                | APIError::InvalidJson(_)
                | APIError::InvalidData(_)
                | APIError::TransactionConflict => {}
                APIError::InternalError(e) => {
                    error!(
                        "HTTP {} internal server error at <{}>: {}",
                        response.response().status(),
                        response.request().uri(),
                        e
                    );
                }
            }
        } else {
            error!(
                "HTTP {} unexpected error at <{}>: {:?}",
                response.response().status(),
                response.request().uri(),
                error
            );
        }
    }
    Ok(response)
}
