
use super::*;
use crate::data_store::models::ReservationStatus;
use crate::data_store::store_mock::StoreMock;
use crate::web::cache::Caches;
use crate::web::AppState;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::{http, test, web, App};
use sample_data::*;
use serde_json::json;
use std::sync::Arc;

fn make_state(store: Arc<StoreMock>) -> AppState {
    AppState {
        store,
        timezone: chrono_tz::Europe::Madrid,
        session_max_age: chrono::Duration::days(30),
        caches: Arc::new(Caches::default()),
    }
}

fn setup_store() -> Arc<StoreMock> {
    let store = Arc::new(StoreMock::default());
    fill_sample_data(&store);
    store
}

macro_rules! init_app {
    ($store:expr) => {
        test::init_service(
            App::new()
                .configure(configure_app)
                .app_data(web::Data::new(make_state($store))),
        )
        .await
    };
}

async fn body_json(res: ServiceResponse) -> serde_json::Value {
    let body = res.into_body().try_into_bytes().unwrap();
    println!("{:#?}", body);
    serde_json::from_slice(&body).unwrap()
}

fn bearer(token: &str) -> (http::header::HeaderName, String) {
    (http::header::AUTHORIZATION, format!("Bearer {}", token))
}

fn stored_status(store: &StoreMock, reservation_id: i32) -> ReservationStatus {
    store
        .data
        .lock()
        .unwrap()
        .reservations
        .iter()
        .find(|r| r.reservation.id == reservation_id)
        .unwrap()
        .reservation
        .status
}

#[actix_web::test]
async fn test_login_and_current_user() {
    let store = setup_store();
    let app = init_app!(store.clone());

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({"email": " Lucia@Instituto.es", "password": STUDENT_PASSWORD}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    let result: classy_api_types::LoginResponse =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(result.user.id, STUDENT_ID);
    assert_eq!(result.user.role, classy_api_types::UserRole::Student);

    let req = test::TestRequest::get()
        .uri("/api/user")
        .append_header(bearer(&result.token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    let user = body_json(res).await;
    assert_eq!(user["email"], "lucia@instituto.es");
    assert!(user.get("password_hash").is_none());

    let req = test::TestRequest::post()
        .uri("/api/logout")
        .append_header(bearer(&result.token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri("/api/user")
        .append_header(bearer(&result.token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_login_wrong_password() {
    let app = init_app!(setup_store());
    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({"email": "lucia@instituto.es", "password": "wrong-password"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(res).await["message"],
        "Invalid email address or password."
    );

    // Users with an empty password hash can never log in
    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({"email": "admin@instituto.es", "password": "x"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_authentication_required() {
    let app = init_app!(setup_store());

    let req = test::TestRequest::get().uri("/api/reservations").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/rooms")
        .append_header(bearer("bm90IGEgdmFsaWQgdG9rZW4"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);

    // The equipment list is public
    let req = test::TestRequest::get().uri("/api/equipment").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    let equipment: Vec<classy_api_types::Equipment> =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(equipment.len(), 2);
}

#[actix_web::test]
async fn test_list_reservations() {
    let store = setup_store();
    let token = login_as(&store, TEACHER_ID);
    let app = init_app!(store);

    let req = test::TestRequest::get()
        .uri("/api/reservations")
        .append_header(bearer(&token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    let result: Vec<classy_api_types::Reservation> =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(
        result.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![RESERVATION_LAB, RESERVATION_PROJECTOR]
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api/reservations?user={}", STUDENT_ID))
        .append_header(bearer(&token))
        .to_request();
    let res = test::call_service(&app, req).await;
    let result: Vec<classy_api_types::Reservation> =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(
        result.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![RESERVATION_PROJECTOR]
    );
}

#[actix_web::test]
async fn test_create_reservation_conflict() {
    let store = setup_store();
    let token = login_as(&store, STUDENT_ID);
    let app = init_app!(store.clone());

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .append_header(bearer(&token))
        .set_json(json!({
            "aula_id": ROOM_LAB,
            "fecha_inicio": "2026-02-02T08:30:00Z",
            "fecha_fin": "2026-02-02T09:30:00Z",
            "observaciones": "Repaso para el examen",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::CONFLICT);
    let body = body_json(res).await;
    assert_eq!(
        body["message"],
        "A reservation with the same room already exists in that time slot (02/02, 09:00–10:00). Please choose another time or resource."
    );
    assert_eq!(body["conflictingReservation"], RESERVATION_LAB);
    assert_eq!(store.data.lock().unwrap().reservations.len(), 2);
}

#[actix_web::test]
async fn test_create_reservation_for_self() {
    let store = setup_store();
    let token = login_as(&store, STUDENT_ID);
    let app = init_app!(store.clone());

    // Touching the lab reservation is fine. Requester and status are forced for students.
    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .append_header(bearer(&token))
        .set_json(json!({
            "user_id": ADMIN_ID,
            "room": {"id": ROOM_LAB, "nombre": "Laboratorio de Física"},
            "start": "2026-02-02T09:00:00Z",
            "end": "2026-02-02T10:00:00Z",
            "status": "pending",
            "notes": "  Club de ciencias ",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::CREATED);
    let result: classy_api_types::Reservation =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(result.user_id, Some(STUDENT_ID));
    assert_eq!(result.status, classy_api_types::ReservationStatus::Active);
    assert_eq!(result.room_ids, vec![ROOM_LAB]);
    assert_eq!(result.notes, "Club de ciencias");
    assert_eq!(store.data.lock().unwrap().reservations.len(), 3);
}

#[actix_web::test]
async fn test_create_reservation_field_errors() {
    let store = setup_store();
    let token = login_as(&store, STUDENT_ID);
    let app = init_app!(store);

    let cases = [
        (
            json!({"start": "2026-02-03T08:00:00Z", "end": "2026-02-03T09:00:00Z", "notes": "x"}),
            "You must select at least one equipment item or a room.",
        ),
        (
            json!({"room_id": ROOM_GYM, "start": "2026-02-03T08:00:00Z", "notes": "x"}),
            "You must select a complete time range.",
        ),
        (
            json!({"aula_id": ROOM_GYM, "fecha_inicio": "", "fecha_fin": "", "observaciones": "x"}),
            "You must select a complete time range.",
        ),
        (
            json!({"room_id": ROOM_GYM, "start": "2026-02-03T09:00:00Z", "end": "2026-02-03T09:00:00Z", "notes": "x"}),
            "The end time must be after the start time.",
        ),
        (
            json!({"room_id": ROOM_GYM, "start": "2026-02-03T08:00:00Z", "end": "2026-02-03T09:00:00Z", "notes": "  "}),
            "You must state the purpose of the reservation.",
        ),
    ];
    for (data, message) in cases {
        let req = test::TestRequest::post()
            .uri("/api/reservations")
            .append_header(bearer(&token))
            .set_json(data)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(res).await["message"], message);
    }

    // The laptop is marked as not available
    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .append_header(bearer(&token))
        .set_json(json!({
            "material_ids": [EQUIPMENT_LAPTOP],
            "start": "2026-02-03T08:00:00Z",
            "end": "2026-02-03T09:00:00Z",
            "notes": "Trabajo en grupo",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn test_guest_booking_by_admin() {
    let store = setup_store();
    let admin_token = login_as(&store, ADMIN_ID);
    let student_token = login_as(&store, STUDENT_ID);
    let app = init_app!(store);

    let data = json!({
        "es_invitado": true,
        "room_ids": [ROOM_GYM],
        "start": "2026-02-05T15:00:00Z",
        "end": "2026-02-05T17:00:00Z",
        "notes": "Torneo de ajedrez (AMPA)",
    });
    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .append_header(bearer(&admin_token))
        .set_json(&data)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::CREATED);
    let result: classy_api_types::Reservation =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(result.user_id, None);

    // Students can't create guest bookings, the request is turned into a booking for themselves.
    // Which collides with the guest booking now.
    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .append_header(bearer(&student_token))
        .set_json(&data)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_check_reservation() {
    let store = setup_store();
    let token = login_as(&store, TEACHER_ID);
    let app = init_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/reservations/check")
        .append_header(bearer(&token))
        .set_json(json!({
            "room_id": ROOM_LAB,
            "equipment_ids": [EQUIPMENT_PROJECTOR],
            "start": "2026-02-02T09:00:00Z",
            "end": "2026-02-02T10:00:00Z",
            "notes": "Tutoría",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    assert_eq!(body_json(res).await, json!({"valid": true}));

    let req = test::TestRequest::post()
        .uri("/api/reservations/check")
        .append_header(bearer(&token))
        .set_json(json!({
            "room_id": ROOM_LAB,
            "start": "2026-02-02T07:30:00Z",
            "end": "2026-02-02T08:30:00Z",
            "notes": "Tutoría",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    let result: classy_api_types::ReservationCheck =
        serde_json::from_value(body_json(res).await).unwrap();
    assert!(!result.valid);
    assert_eq!(result.conflicting_reservation, Some(RESERVATION_LAB));

    // Editing the lab reservation itself does not conflict
    let req = test::TestRequest::post()
        .uri(&format!("/api/reservations/check?exclude={}", RESERVATION_LAB))
        .append_header(bearer(&token))
        .set_json(json!({
            "room_id": ROOM_LAB,
            "start": "2026-02-02T07:30:00Z",
            "end": "2026-02-02T08:30:00Z",
            "notes": "Tutoría",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(body_json(res).await, json!({"valid": true}));
}

#[actix_web::test]
async fn test_update_reservation() {
    let store = setup_store();
    let teacher_token = login_as(&store, TEACHER_ID);
    let student_token = login_as(&store, STUDENT_ID);
    let app = init_app!(store.clone());

    // Moving the own reservation into an overlapping slot of itself
    let req = test::TestRequest::put()
        .uri(&format!("/api/reservations/{}", RESERVATION_LAB))
        .append_header(bearer(&teacher_token))
        .set_json(json!({
            "room_id": ROOM_LAB,
            "start": "2026-02-02T08:30:00Z",
            "end": "2026-02-02T09:30:00Z",
            "notes": "Práctica de óptica (ampliada)",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    let result: classy_api_types::Reservation =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(result.user_id, Some(TEACHER_ID));
    assert_eq!(result.notes, "Práctica de óptica (ampliada)");

    // Adding the projector collides with the student's reservation
    let req = test::TestRequest::put()
        .uri(&format!("/api/reservations/{}", RESERVATION_LAB))
        .append_header(bearer(&teacher_token))
        .set_json(json!({
            "room_id": ROOM_LAB,
            "equipment_id": EQUIPMENT_PROJECTOR,
            "start": "2026-02-02T08:30:00Z",
            "end": "2026-02-02T10:30:00Z",
            "notes": "Práctica de óptica",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::CONFLICT);
    assert_eq!(
        body_json(res).await["message"],
        "A reservation with the same equipment already exists in that time slot (02/02, 11:00–12:00). Please choose another time or resource."
    );

    // Other users' reservations can't be edited
    let req = test::TestRequest::put()
        .uri(&format!("/api/reservations/{}", RESERVATION_LAB))
        .append_header(bearer(&student_token))
        .set_json(json!({
            "room_id": ROOM_LAB,
            "start": "2026-02-02T12:00:00Z",
            "end": "2026-02-02T13:00:00Z",
            "notes": "Mío",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_cancel_and_return_reservation() {
    let store = setup_store();
    let teacher_token = login_as(&store, TEACHER_ID);
    let student_token = login_as(&store, STUDENT_ID);
    let app = init_app!(store.clone());

    // Only the owner (or an admin) may cancel
    let req = test::TestRequest::delete()
        .uri(&format!("/api/reservations/{}", RESERVATION_PROJECTOR))
        .append_header(bearer(&teacher_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/reservations/{}", RESERVATION_PROJECTOR))
        .append_header(bearer(&student_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::NO_CONTENT);
    assert_eq!(
        stored_status(&store, RESERVATION_PROJECTOR),
        ReservationStatus::Cancelled
    );

    // Cancelled reservations don't block the projector anymore
    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .append_header(bearer(&teacher_token))
        .set_json(json!({
            "material_id": EQUIPMENT_PROJECTOR,
            "start": "2026-02-02T10:00:00Z",
            "end": "2026-02-02T11:00:00Z",
            "notes": "Cine fórum",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::CREATED);

    // ... and can't be returned
    let req = test::TestRequest::post()
        .uri(&format!("/api/reservations/{}/return", RESERVATION_PROJECTOR))
        .append_header(bearer(&student_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri(&format!("/api/reservations/{}/return", RESERVATION_LAB))
        .append_header(bearer(&teacher_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    let result: classy_api_types::Reservation =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(result.status, classy_api_types::ReservationStatus::Completed);
}

#[actix_web::test]
async fn test_inventory_permissions() {
    let store = setup_store();
    let admin_token = login_as(&store, ADMIN_ID);
    let student_token = login_as(&store, STUDENT_ID);
    let app = init_app!(store.clone());

    let room = json!({
        "name": "Aula 204",
        "type": "Aula ordinaria",
        "capacity": 30,
        "location": "Planta 2",
    });
    let req = test::TestRequest::post()
        .uri("/api/rooms")
        .append_header(bearer(&student_token))
        .set_json(&room)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/rooms")
        .append_header(bearer(&admin_token))
        .set_json(&room)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::CREATED);
    let result: classy_api_types::Room = serde_json::from_value(body_json(res).await).unwrap();
    assert!(result.available);

    // The cached room list has been invalidated
    let req = test::TestRequest::get()
        .uri("/api/rooms")
        .append_header(bearer(&student_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    let rooms: Vec<classy_api_types::Room> =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(rooms.len(), 3);

    let req = test::TestRequest::get()
        .uri("/api/users")
        .append_header(bearer(&student_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_equipment_search_and_barcode() {
    let store = setup_store();
    let token = login_as(&store, STUDENT_ID);
    let app = init_app!(store);

    let req = test::TestRequest::get()
        .uri("/api/equipment/search?q=AUDIO")
        .append_header(bearer(&token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    let result: Vec<classy_api_types::Equipment> =
        serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(
        result.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![EQUIPMENT_PROJECTOR]
    );

    let req = test::TestRequest::get()
        .uri("/api/equipment/barcode/8412345000017")
        .append_header(bearer(&token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::OK);
    assert_eq!(body_json(res).await["code"], "PRJ-01");

    let req = test::TestRequest::get()
        .uri("/api/equipment/barcode/0000")
        .append_header(bearer(&token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_delete_user_keeps_reservations() {
    let store = setup_store();
    let admin_token = login_as(&store, ADMIN_ID);
    let app = init_app!(store.clone());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", STUDENT_ID))
        .append_header(bearer(&admin_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::NO_CONTENT);
    let data = store.data.lock().unwrap();
    assert!(data.users.iter().all(|u| u.id != STUDENT_ID));
    let reservation = data
        .reservations
        .iter()
        .find(|r| r.reservation.id == RESERVATION_PROJECTOR)
        .unwrap();
    assert_eq!(reservation.reservation.user_id, None);
    drop(data);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", ADMIN_ID))
        .append_header(bearer(&admin_token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn test_store_errors() {
    let store = setup_store();
    let token = login_as(&store, STUDENT_ID);
    let app = init_app!(store.clone());

    store.data.lock().unwrap().next_error = Some(crate::data_store::StoreError::TransactionConflict);
    let req = test::TestRequest::get()
        .uri("/api/user")
        .append_header(bearer(&token))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::SERVICE_UNAVAILABLE);
}
