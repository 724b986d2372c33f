//! Rules for writing reservations, shared by all [super::ClassyStore] implementations

use super::auth_token::{AuthToken, Privilege};
use super::models::{
    Equipment, FullNewReservation, FullReservation, Reservation, ReservationStatus, Room,
};
use super::{EquipmentId, ReservationId, RoomId, StoreError, UserId};
use crate::booking::{self, Candidate, ResourceSet};
use log::warn;
use std::collections::HashMap;

/// Check if the client may write `new` (replacing `previous`, if given).
///
/// Owners may edit their own reservations. Without [Privilege::ManageAllReservations], a
/// reservation must belong to the client itself and new reservations must be active. Status
/// changes must follow the reservation state machine in any case.
pub(super) fn check_reservation_write_allowed(
    auth_token: &AuthToken,
    new: &FullNewReservation,
    previous: Option<&Reservation>,
) -> Result<(), StoreError> {
    if let Some(previous) = previous {
        auth_token.check_owner_or_privilege(previous.user_id, Privilege::ManageAllReservations)?;
        booking::status::check_transition(previous.status, new.reservation.status)
            .map_err(|e| StoreError::InvalidInputData(e.to_string()))?;
    }
    if auth_token.has_privilege(Privilege::ManageAllReservations) {
        return Ok(());
    }
    auth_token.check_privilege(Privilege::BookForSelf)?;
    let expected_status = previous
        .map(|p| p.status)
        .unwrap_or(ReservationStatus::Active);
    if new.reservation.user_id.is_none()
        || new.reservation.user_id != auth_token.user_id()
        || new.reservation.status != expected_status
    {
        return Err(StoreError::PermissionDenied {
            required_privilege: Privilege::ManageAllReservations,
        });
    }
    Ok(())
}

/// Check if the client may change the status of the `previous` reservation to `new_status`.
///
/// Owners may only cancel or return their reservations. Other changes require
/// [Privilege::ManageAllReservations].
pub(super) fn check_status_change_allowed(
    auth_token: &AuthToken,
    previous: &Reservation,
    new_status: ReservationStatus,
) -> Result<(), StoreError> {
    auth_token.check_owner_or_privilege(previous.user_id, Privilege::ManageAllReservations)?;
    if !matches!(
        new_status,
        ReservationStatus::Cancelled | ReservationStatus::Completed
    ) {
        auth_token.check_privilege(Privilege::ManageAllReservations)?;
    }
    booking::status::check_transition(previous.status, new_status)
        .map_err(|e| StoreError::InvalidInputData(e.to_string()))
}

/// Translate the user and resource references of an imported reservation from the ids of the
/// import source to the ids assigned by the store.
///
/// References to unknown users turn the reservation into a guest booking. References to unknown
/// resources are an error.
pub(super) fn translate_import_ids(
    mut reservation: FullNewReservation,
    user_ids: &HashMap<UserId, UserId>,
    room_ids: &HashMap<RoomId, RoomId>,
    equipment_ids: &HashMap<EquipmentId, EquipmentId>,
) -> Result<FullNewReservation, StoreError> {
    if let Some(old_user_id) = reservation.reservation.user_id {
        let new_user_id = user_ids.get(&old_user_id).copied();
        if new_user_id.is_none() {
            warn!(
                "Imported reservation references unknown user {}. Storing it as guest booking.",
                old_user_id
            );
        }
        reservation.reservation.user_id = new_user_id;
    }
    let rooms = reservation
        .resources
        .room_ids()
        .iter()
        .map(|r| {
            room_ids.get(r).copied().ok_or_else(|| {
                StoreError::InvalidInputData(format!("Reservation references unknown room {}", r))
            })
        })
        .collect::<Result<Vec<RoomId>, StoreError>>()?;
    let equipment = reservation
        .resources
        .equipment_ids()
        .iter()
        .map(|e| {
            equipment_ids.get(e).copied().ok_or_else(|| {
                StoreError::InvalidInputData(format!(
                    "Reservation references unknown equipment item {}",
                    e
                ))
            })
        })
        .collect::<Result<Vec<EquipmentId>, StoreError>>()?;
    reservation.resources = ResourceSet::new(rooms, equipment);
    Ok(reservation)
}

/// Check that all requested resources exist and are available for booking.
///
/// `rooms` and `equipment` must contain the (non-deleted) inventory records of the requested
/// resources. Resources which are already part of the `previous` version of the reservation may
/// stay booked, even if they have been marked as unavailable in the meantime.
pub(super) fn check_resources_bookable(
    requested: &ResourceSet,
    previous: Option<&ResourceSet>,
    rooms: &[Room],
    equipment: &[Equipment],
) -> Result<(), StoreError> {
    for room_id in requested.room_ids() {
        let already_booked = previous.is_some_and(|p| p.room_ids().contains(room_id));
        match rooms.iter().find(|r| r.id == *room_id) {
            None => {
                return Err(StoreError::InvalidInputData(format!(
                    "Room {} does not exist.",
                    room_id
                )))
            }
            Some(room) if !room.available && !already_booked => {
                return Err(StoreError::InvalidInputData(format!(
                    "Room {} is not available for reservations.",
                    room.name
                )))
            }
            Some(_) => {}
        }
    }
    for equipment_id in requested.equipment_ids() {
        let already_booked = previous.is_some_and(|p| p.equipment_ids().contains(equipment_id));
        match equipment.iter().find(|e| e.id == *equipment_id) {
            None => {
                return Err(StoreError::InvalidInputData(format!(
                    "Equipment item {} does not exist.",
                    equipment_id
                )))
            }
            Some(item) if !item.available && !already_booked => {
                return Err(StoreError::InvalidInputData(format!(
                    "Equipment item {} is not available for reservations.",
                    item.name
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Check the reservation for double bookings against `existing`, if it is going to be active.
pub(super) fn check_no_conflict(
    new: &FullNewReservation,
    existing: &[FullReservation],
    exclude_id: Option<ReservationId>,
    timezone: &chrono_tz::Tz,
) -> Result<(), StoreError> {
    if new.reservation.status != ReservationStatus::Active {
        return Ok(());
    }
    booking::validate(
        &Candidate {
            resources: &new.resources,
            start: new.reservation.start,
            end: new.reservation.end,
        },
        existing,
        exclude_id,
        timezone,
    )
    .into_store_result()
}

/// Basic sanity check of reservation data, for data which did not pass the web API's field checks
/// (e.g. from the command line interface).
pub(super) fn check_reservation_data(new: &FullNewReservation) -> Result<(), StoreError> {
    if new.resources.is_empty() {
        return Err(StoreError::InvalidInputData(
            booking::FieldError::NoResources.to_string(),
        ));
    }
    if new.reservation.start >= new.reservation.end {
        return Err(StoreError::InvalidInputData(
            booking::FieldError::EndNotAfterStart.to_string(),
        ));
    }
    Ok(())
}
