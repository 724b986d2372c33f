use crate::data_store::EquipmentId;
use crate::web::api::{require_session_token, APIError, BearerTokenHeader};
use crate::web::cache::INVENTORY_TTL;
use crate::web::util::SearchQuery;
use crate::web::validation::validate_equipment;
use crate::web::AppState;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

/// List all equipment items. This endpoint does not require authentication.
#[get("/equipment")]
async fn list_equipment(state: web::Data<AppState>) -> Result<impl Responder, APIError> {
    let equipment: Vec<classy_api_types::Equipment> = web::block(move || -> Result<_, APIError> {
        Ok(state
            .caches
            .equipment
            .get_or_refresh(INVENTORY_TTL, || state.store.get_facade()?.get_equipment())?)
    })
    .await??
    .into_iter()
    .map(|e| e.into())
    .collect();

    Ok(web::Json(equipment))
}

#[get("/equipment/search")]
async fn search_equipment(
    query: web::Query<SearchQuery>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let query = query.into_inner().q;
    let equipment: Vec<classy_api_types::Equipment> = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        Ok(store.search_equipment(&auth, &query)?)
    })
    .await??
    .into_iter()
    .map(|e| e.into())
    .collect();

    Ok(web::Json(equipment))
}

#[get("/equipment/barcode/{barcode}")]
async fn get_equipment_by_barcode(
    path: web::Path<String>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let barcode = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let equipment: classy_api_types::Equipment = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        Ok(store.get_equipment_by_barcode(&auth, barcode.trim())?)
    })
    .await??
    .into();
    Ok(web::Json(equipment))
}

#[get("/equipment/{equipment_id}")]
async fn get_equipment_item(
    path: web::Path<EquipmentId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let equipment_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let equipment: classy_api_types::Equipment = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        Ok(store.get_equipment_item(&auth, equipment_id)?)
    })
    .await??
    .into();
    Ok(web::Json(equipment))
}

#[post("/equipment")]
async fn create_equipment(
    data: web::Json<classy_api_types::NewEquipment>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let equipment = validate_equipment(data.into_inner())?;
    let equipment: classy_api_types::Equipment = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        let equipment_id = store.create_equipment(&auth, equipment)?;
        state.caches.equipment.invalidate();
        Ok(store.get_equipment_item(&auth, equipment_id)?)
    })
    .await??
    .into();
    Ok(HttpResponse::Created().json(equipment))
}

#[put("/equipment/{equipment_id}")]
async fn update_equipment(
    path: web::Path<EquipmentId>,
    data: web::Json<classy_api_types::NewEquipment>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let equipment_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let equipment = validate_equipment(data.into_inner())?;
    let equipment: classy_api_types::Equipment = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        store.update_equipment(&auth, equipment_id, equipment)?;
        state.caches.equipment.invalidate();
        Ok(store.get_equipment_item(&auth, equipment_id)?)
    })
    .await??
    .into();
    Ok(web::Json(equipment))
}

#[delete("/equipment/{equipment_id}")]
async fn delete_equipment(
    path: web::Path<EquipmentId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let equipment_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        store.delete_equipment(&auth, equipment_id)?;
        state.caches.equipment.invalidate();
        Ok(())
    })
    .await??;

    Ok(HttpResponse::NoContent())
}
