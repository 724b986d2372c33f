use crate::auth_session::SessionToken;
use crate::web::api::{require_session_token, APIError, BearerTokenHeader};
use crate::web::AppState;
use actix_web::{get, post, web, HttpResponse, Responder};
use classy_api_types::{LoginRequest, LoginResponse};

#[post("/login")]
async fn login(
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<impl Responder, APIError> {
    let credentials = body.into_inner();
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(APIError::InvalidData(
            "Email address and password are required.".to_owned(),
        ));
    }
    let session_token = SessionToken::generate()?;
    let (user, session_token) = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let user = store.authenticate_with_password(
            &credentials.email,
            &credentials.password,
            &session_token,
        )?;
        Ok((user, session_token))
    })
    .await??;

    Ok(web::Json(LoginResponse {
        token: session_token.as_string(),
        user: user.into(),
    }))
}

#[post("/logout")]
async fn logout(
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = session_token_header
        .map(|token_header| token_header.into_inner().session_token())
        .transpose()?;
    if let Some(session_token) = session_token {
        web::block(move || -> Result<_, APIError> {
            let mut store = state.store.get_facade()?;
            store.logout(&session_token)?;
            Ok(())
        })
        .await??;
    }
    Ok(HttpResponse::NoContent())
}

#[get("/user")]
async fn current_user(
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let user: classy_api_types::User = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        let user_id = auth.user_id().ok_or(APIError::InvalidSessionToken)?;
        Ok(store.get_user(&auth, user_id)?)
    })
    .await??
    .into();
    Ok(web::Json(user))
}
