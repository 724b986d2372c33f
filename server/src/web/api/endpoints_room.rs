use crate::data_store::auth_token::Privilege;
use crate::data_store::RoomId;
use crate::web::api::{require_session_token, APIError, BearerTokenHeader};
use crate::web::cache::INVENTORY_TTL;
use crate::web::validation::validate_room;
use crate::web::AppState;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

#[get("/rooms")]
async fn list_rooms(
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let rooms: Vec<classy_api_types::Room> = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        auth.check_privilege(Privilege::ShowInventory)?;
        Ok(state
            .caches
            .rooms
            .get_or_refresh(INVENTORY_TTL, || store.get_rooms(&auth))?)
    })
    .await??
    .into_iter()
    .map(|r| r.into())
    .collect();

    Ok(web::Json(rooms))
}

#[get("/rooms/{room_id}")]
async fn get_room(
    path: web::Path<RoomId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let room_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let room: classy_api_types::Room = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        Ok(store.get_room(&auth, room_id)?)
    })
    .await??
    .into();
    Ok(web::Json(room))
}

#[post("/rooms")]
async fn create_room(
    data: web::Json<classy_api_types::NewRoom>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let room = validate_room(data.into_inner())?;
    let room: classy_api_types::Room = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        let room_id = store.create_room(&auth, room)?;
        state.caches.rooms.invalidate();
        Ok(store.get_room(&auth, room_id)?)
    })
    .await??
    .into();
    Ok(HttpResponse::Created().json(room))
}

#[put("/rooms/{room_id}")]
async fn update_room(
    path: web::Path<RoomId>,
    data: web::Json<classy_api_types::NewRoom>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let room_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let room = validate_room(data.into_inner())?;
    let room: classy_api_types::Room = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        store.update_room(&auth, room_id, room)?;
        state.caches.rooms.invalidate();
        Ok(store.get_room(&auth, room_id)?)
    })
    .await??
    .into();
    Ok(web::Json(room))
}

#[delete("/rooms/{room_id}")]
async fn delete_room(
    path: web::Path<RoomId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let room_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        store.delete_room(&auth, room_id)?;
        state.caches.rooms.invalidate();
        Ok(())
    })
    .await??;

    Ok(HttpResponse::NoContent())
}
