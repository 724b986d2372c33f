use crate::booking::{validate, Candidate, Decision};
use crate::cli::CliAuthTokenKey;
use crate::cli_error::CliError;
use crate::data_store::auth_token::AuthToken;
use crate::data_store::models::{FullReservation, ReservationStatus};
use crate::data_store::{get_store_from_env, ClassyStore, ReservationFilter, ReservationId};
use crate::setup::get_timezone_from_env;
use std::collections::BTreeMap;

/// Print a table of the reservations. Unless `all` is set, only active reservations are listed.
pub fn print_reservation_list(all: bool) -> Result<(), CliError> {
    let timezone = get_timezone_from_env()?;
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let auth_key = CliAuthTokenKey::new();
    let auth_token = AuthToken::create_for_cli(&auth_key);
    let filter = ReservationFilter {
        status: if all {
            None
        } else {
            Some(ReservationStatus::Active)
        },
        ..ReservationFilter::default()
    };
    let reservations = data_store.get_reservations_filtered(&auth_token, filter)?;
    let user_names: BTreeMap<_, _> = data_store
        .get_users(&auth_token)?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let format = "%Y-%m-%d %H:%M";
    let mut table = comfy_table::Table::new();
    table
        .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED)
        .set_header(vec![
            "id", "user", "rooms", "equipment", "start", "end", "status", "notes",
        ])
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic)
        .add_rows(reservations.into_iter().map(|r| {
            [
                r.reservation.id.to_string(),
                match r.reservation.user_id {
                    Some(user_id) => user_names
                        .get(&user_id)
                        .cloned()
                        .unwrap_or_else(|| user_id.to_string()),
                    None => "(guest)".to_owned(),
                },
                join_ids(r.resources.room_ids()),
                join_ids(r.resources.equipment_ids()),
                r.reservation
                    .start
                    .with_timezone(&timezone)
                    .format(format)
                    .to_string(),
                r.reservation
                    .end
                    .with_timezone(&timezone)
                    .format(format)
                    .to_string(),
                r.reservation.status.name().to_owned(),
                r.reservation.notes,
            ]
        }));

    println!("{table}");
    Ok(())
}

/// Check all active reservations for double bookings, e.g. after importing data from the legacy
/// system, and print each conflict.
///
/// Returns [CliError::ConflictsFound] if any active reservation collides with another one.
pub fn check_conflicts() -> Result<(), CliError> {
    let timezone = get_timezone_from_env()?;
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let auth_key = CliAuthTokenKey::new();
    let auth_token = AuthToken::create_for_cli(&auth_key);
    let reservations = data_store.get_reservations_filtered(
        &auth_token,
        ReservationFilter {
            status: Some(ReservationStatus::Active),
            ..ReservationFilter::default()
        },
    )?;

    let conflicts = find_conflicts(&reservations, &timezone);
    for (reservation_id, conflicting_reservation, message) in conflicts.iter() {
        println!(
            "Reservation {} collides with reservation {}: {}",
            reservation_id, conflicting_reservation, message
        );
    }
    if !conflicts.is_empty() {
        return Err(CliError::ConflictsFound(conflicts.len()));
    }
    println!(
        "No conflicts found in {} active reservations.",
        reservations.len()
    );
    Ok(())
}

/// Validate every reservation against all others. Each colliding pair is reported once, from the
/// perspective of the later reservation.
fn find_conflicts(
    reservations: &[FullReservation],
    timezone: &chrono_tz::Tz,
) -> Vec<(ReservationId, ReservationId, String)> {
    let mut result = Vec::new();
    for reservation in reservations {
        let candidate = Candidate {
            resources: &reservation.resources,
            start: reservation.reservation.start,
            end: reservation.reservation.end,
        };
        let earlier: Vec<FullReservation> = reservations
            .iter()
            .filter(|r| {
                (r.reservation.start, r.reservation.id)
                    < (reservation.reservation.start, reservation.reservation.id)
            })
            .cloned()
            .collect();
        if let Decision::Conflict {
            message,
            conflicting_reservation,
        } = validate(
            &candidate,
            &earlier,
            Some(reservation.reservation.id),
            timezone,
        ) {
            result.push((reservation.reservation.id, conflicting_reservation, message));
        }
    }
    result
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
