use crate::booking::{self, Candidate, ReservationDraft};
use crate::data_store::auth_token::{AuthToken, Privilege};
use crate::data_store::models::ReservationStatus;
use crate::data_store::{ClassyStoreFacade, ReservationFilter, ReservationId, StoreError};
use crate::web::api::{require_session_token, APIError, BearerTokenHeader};
use crate::web::cache::RESERVATIONS_TTL;
use crate::web::util::ReservationFilterAsQuery;
use crate::web::AppState;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde::Deserialize;

#[get("/reservations")]
async fn list_reservations(
    query: web::Query<ReservationFilterAsQuery>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let filter: ReservationFilter = query.into_inner().into();
    let reservations: Vec<classy_api_types::Reservation> =
        web::block(move || -> Result<_, APIError> {
            let mut store = state.store.get_facade()?;
            let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
            auth.check_privilege(Privilege::ShowReservations)?;
            Ok(state
                .caches
                .reservations
                .get_or_refresh(RESERVATIONS_TTL, || {
                    store.get_reservations_filtered(&auth, ReservationFilter::default())
                })?)
        })
        .await??
        .into_iter()
        .filter(|r| filter.matches(r))
        .map(|r| r.into())
        .collect();

    Ok(web::Json(reservations))
}

#[get("/reservations/{reservation_id}")]
async fn get_reservation(
    path: web::Path<ReservationId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let reservation_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let reservation: classy_api_types::Reservation = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        Ok(store.get_reservation(&auth, reservation_id)?)
    })
    .await??
    .into();
    Ok(web::Json(reservation))
}

#[derive(Deserialize)]
struct CheckQuery {
    /// Id of the reservation being edited, which must not be reported as conflicting with itself
    #[serde(default)]
    exclude: Option<ReservationId>,
}

/// Check a reservation candidate for double bookings, without storing it.
///
/// This check runs on a fresh snapshot of the reservations, but it is not atomic with a
/// subsequent create or update request. The store repeats the check when writing.
#[post("/reservations/check")]
async fn check_reservation(
    query: web::Query<CheckQuery>,
    data: web::Json<classy_api_types::NewReservation>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let exclude_id = query.into_inner().exclude;
    let mut draft = ReservationDraft::from(data.into_inner());
    let result: classy_api_types::ReservationCheck = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        auth.check_privilege(Privilege::BookForSelf)?;
        if !auth.has_privilege(Privilege::ManageAllReservations) {
            if let Some(user_id) = auth.user_id() {
                draft.book_for_self(user_id);
            }
        }
        let candidate = draft.check_fields()?;
        let existing = state.caches.reservations.force_refresh(|| {
            store.get_reservations_filtered(&auth, ReservationFilter::default())
        })?;
        Ok(booking::validate(
            &Candidate {
                resources: &candidate.resources,
                start: candidate.reservation.start,
                end: candidate.reservation.end,
            },
            &existing,
            exclude_id,
            &state.timezone,
        ))
    })
    .await??
    .into();
    Ok(web::Json(result))
}

#[post("/reservations")]
async fn create_reservation(
    data: web::Json<classy_api_types::NewReservation>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let session_token = require_session_token(session_token_header)?;
    let mut draft = ReservationDraft::from(data.into_inner());
    let reservation: classy_api_types::Reservation = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        if !auth.has_privilege(Privilege::ManageAllReservations) {
            auth.check_privilege(Privilege::BookForSelf)?;
            let user_id = auth.user_id().ok_or(APIError::InvalidSessionToken)?;
            draft.book_for_self(user_id);
        }
        let reservation = draft.check_fields()?;
        let result = store.create_reservation(&auth, reservation, &state.timezone);
        state.caches.reservations.invalidate();
        let reservation_id = result?;
        Ok(store.get_reservation(&auth, reservation_id)?)
    })
    .await??
    .into();
    Ok(HttpResponse::Created().json(reservation))
}

#[put("/reservations/{reservation_id}")]
async fn update_reservation(
    path: web::Path<ReservationId>,
    data: web::Json<classy_api_types::NewReservation>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let reservation_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let mut draft = ReservationDraft::from(data.into_inner());
    let reservation: classy_api_types::Reservation = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        let previous = store.get_reservation(&auth, reservation_id)?;
        if auth.has_privilege(Privilege::ManageAllReservations) {
            if draft.status.is_none() {
                draft.status = Some(previous.reservation.status);
            }
        } else {
            // Users can only edit their own reservations and only change the status via the
            // cancel and return endpoints
            let user_id = auth.user_id().ok_or(APIError::InvalidSessionToken)?;
            draft.user_id = Some(user_id);
            draft.guest = false;
            draft.status = Some(previous.reservation.status);
        }
        let reservation = draft.check_fields()?;
        let result =
            store.update_reservation(&auth, reservation_id, reservation, &state.timezone);
        state.caches.reservations.invalidate();
        result?;
        Ok(store.get_reservation(&auth, reservation_id)?)
    })
    .await??
    .into();
    Ok(web::Json(reservation))
}

/// Cancel the reservation. Reservations are never deleted, to keep the booking history.
#[delete("/reservations/{reservation_id}")]
async fn cancel_reservation(
    path: web::Path<ReservationId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let reservation_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        change_status(
            &mut *store,
            &auth,
            &state,
            reservation_id,
            ReservationStatus::Cancelled,
        )?;
        Ok(())
    })
    .await??;

    Ok(HttpResponse::NoContent())
}

/// Mark the reserved equipment or room as returned, i.e. complete the reservation.
#[post("/reservations/{reservation_id}/return")]
async fn return_reservation(
    path: web::Path<ReservationId>,
    state: web::Data<AppState>,
    session_token_header: Option<web::Header<BearerTokenHeader>>,
) -> Result<impl Responder, APIError> {
    let reservation_id = path.into_inner();
    let session_token = require_session_token(session_token_header)?;
    let reservation: classy_api_types::Reservation = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let auth = store.get_auth_token_for_session(&session_token, state.session_max_age)?;
        change_status(
            &mut *store,
            &auth,
            &state,
            reservation_id,
            ReservationStatus::Completed,
        )?;
        Ok(store.get_reservation(&auth, reservation_id)?)
    })
    .await??
    .into();
    Ok(web::Json(reservation))
}

fn change_status(
    store: &mut dyn ClassyStoreFacade,
    auth: &AuthToken,
    state: &AppState,
    reservation_id: ReservationId,
    status: ReservationStatus,
) -> Result<(), StoreError> {
    let result = store.set_reservation_status(auth, reservation_id, status, &state.timezone);
    state.caches.reservations.invalidate();
    result
}
