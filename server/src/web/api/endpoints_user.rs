use crate::data_store::UserId;
use crate::web::api::{require_session_token, APIError, BearerTokenHeader};
use crate::web::validation::validate_user;
use crate::web::AppState;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

#[get("/users")]
async fn list_users(
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let users: Vec<classy_api_types::User> = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        Ok(store.get_users(&auth)?)
    })
    .await??
    .into_iter()
    .map(|u| u.into())
    .collect();

    Ok(web::Json(users))
}

#[get("/users/{user_id}")]
async fn get_user(
    path: web::Path<UserId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let user_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let user: classy_api_types::User = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        Ok(store.get_user(&auth, user_id)?)
    })
    .await??
    .into();
    Ok(web::Json(user))
}

#[post("/users")]
async fn create_user(
    data: web::Json<classy_api_types::NewUser>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let data = data.into_inner();
    let user: classy_api_types::User = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        // Hashes the password, which must not run on the async executor
        let user = validate_user(data, true)?;
        let user_id = store.create_user(&auth, user)?;
        Ok(store.get_user(&auth, user_id)?)
    })
    .await??
    .into();
    Ok(HttpResponse::Created().json(user))
}

#[put("/users/{user_id}")]
async fn update_user(
    path: web::Path<UserId>,
    data: web::Json<classy_api_types::NewUser>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let user_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let data = data.into_inner();
    let user: classy_api_types::User = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        let user = validate_user(data, false)?;
        store.update_user(&auth, user_id, user)?;
        Ok(store.get_user(&auth, user_id)?)
    })
    .await??
    .into();
    Ok(web::Json(user))
}

#[delete("/users/{user_id}")]
async fn delete_user(
    path: web::Path<UserId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let user_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        store.delete_user(&auth, user_id)?;
        // Former reservations of the user are guest bookings now
        state.caches.reservations.invalidate();
        Ok(())
    })
    .await??;

    Ok(HttpResponse::NoContent())
}
