use crate::booking::ResourceSet;
use crate::data_store::models::{FullReservation, ReservationStatus};
use crate::data_store::{ReservationId, StoreError};
use chrono::{DateTime, Utc};

/// A reservation that is about to be created or changed, reduced to what matters for detecting
/// double bookings.
pub struct Candidate<'a> {
    pub resources: &'a ResourceSet,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Outcome of checking a [Candidate] against the existing reservations
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Valid,
    Conflict {
        /// User-facing description of the collision, naming the resource kind and time window
        message: String,
        conflicting_reservation: ReservationId,
    },
}

impl Decision {
    pub fn is_valid(&self) -> bool {
        matches!(self, Decision::Valid)
    }

    /// Turn a conflict into a [StoreError::ReservationConflict], for use in store implementations
    /// which refuse to write a double booking.
    pub fn into_store_result(self) -> Result<(), StoreError> {
        match self {
            Decision::Valid => Ok(()),
            Decision::Conflict {
                message,
                conflicting_reservation,
            } => Err(StoreError::ReservationConflict {
                message,
                conflicting_reservation,
            }),
        }
    }
}

impl From<Decision> for classy_api_types::ReservationCheck {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Valid => Self {
                valid: true,
                message: None,
                conflicting_reservation: None,
            },
            Decision::Conflict {
                message,
                conflicting_reservation,
            } => Self {
                valid: false,
                message: Some(message),
                conflicting_reservation: Some(conflicting_reservation),
            },
        }
    }
}

/// Half-open interval overlap. Intervals which only touch at one end do not overlap.
pub fn intervals_overlap(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> bool {
    start_a < end_b && start_b < end_a
}

/// Decide whether `candidate` may be committed, given the `existing` reservations.
///
/// Only active reservations are considered. The reservation with id `exclude_id` (i.e. the
/// reservation being edited) is ignored. If several reservations collide with the candidate, the
/// one with the earliest start (then the lowest id) is reported. Times in the conflict message
/// are rendered in `timezone`.
///
/// The candidate's fields (time range order, non-empty resources, …) are expected to be checked
/// already, see [crate::booking::fields].
pub fn validate(
    candidate: &Candidate,
    existing: &[FullReservation],
    exclude_id: Option<ReservationId>,
    timezone: &chrono_tz::Tz,
) -> Decision {
    let conflict = existing
        .iter()
        .filter(|r| r.reservation.status == ReservationStatus::Active)
        .filter(|r| Some(r.reservation.id) != exclude_id)
        .filter(|r| {
            intervals_overlap(
                candidate.start,
                candidate.end,
                r.reservation.start,
                r.reservation.end,
            )
        })
        .filter(|r| {
            candidate.resources.shares_room_with(&r.resources)
                || candidate.resources.shares_equipment_with(&r.resources)
        })
        .min_by_key(|r| (r.reservation.start, r.reservation.id));

    match conflict {
        None => Decision::Valid,
        Some(conflict) => Decision::Conflict {
            message: conflict_message(candidate.resources, conflict, timezone),
            conflicting_reservation: conflict.reservation.id,
        },
    }
}

fn conflict_message(
    resources: &ResourceSet,
    conflict: &FullReservation,
    timezone: &chrono_tz::Tz,
) -> String {
    let same_room = resources.shares_room_with(&conflict.resources);
    let same_equipment = resources.shares_equipment_with(&conflict.resources);
    let kind = match (same_room, same_equipment) {
        (true, true) => "the same room and the same equipment",
        (true, false) => "the same room",
        (false, true) => "the same equipment",
        (false, false) => "the same resource",
    };
    let start = conflict.reservation.start.with_timezone(timezone);
    let end = conflict.reservation.end.with_timezone(timezone);
    format!(
        "A reservation with {} already exists in that time slot ({}, {}–{}). Please choose another time or resource.",
        kind,
        start.format("%d/%m"),
        start.format("%H:%M"),
        end.format("%H:%M"),
    )
}
