use crate::booking::ResourceSet;
use crate::data_store::models::{FullNewReservation, NewReservation, ReservationStatus};
use crate::data_store::UserId;
use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

/// A reservation request after normalizing the resource references, but before checking the
/// individual fields.
#[derive(Clone, Debug, Default)]
pub struct ReservationDraft {
    pub user_id: Option<UserId>,
    pub guest: bool,
    pub resources: ResourceSet,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<ReservationStatus>,
    pub notes: String,
}

impl From<classy_api_types::NewReservation> for ReservationDraft {
    fn from(value: classy_api_types::NewReservation) -> Self {
        Self {
            resources: ResourceSet::from_request(&value),
            user_id: value.user_id,
            guest: value.guest,
            start: value.start,
            end: value.end,
            status: value.status.map(|s| s.into()),
            notes: value.notes,
        }
    }
}

impl ReservationDraft {
    /// Turn the draft into a booking of the given user for themselves. Users without the privilege
    /// to manage all reservations can only create reservations of this kind.
    pub fn book_for_self(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
        self.guest = false;
        self.status = Some(ReservationStatus::Active);
    }

    /// Check all fields of the draft, in the order a user would fill in the booking form, and
    /// build the reservation to be stored.
    ///
    /// A missing status defaults to active. For guest bookings, the given user id is dropped.
    pub fn check_fields(self) -> Result<FullNewReservation, FieldError> {
        if self.resources.is_empty() {
            return Err(FieldError::NoResources);
        }
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Err(FieldError::IncompleteTimeRange);
        };
        if start >= end {
            return Err(FieldError::EndNotAfterStart);
        }
        if self.notes.trim().is_empty() {
            return Err(FieldError::MissingPurpose);
        }
        if !self.guest && self.user_id.is_none() {
            return Err(FieldError::MissingRequester);
        }
        Ok(FullNewReservation {
            reservation: NewReservation {
                user_id: if self.guest { None } else { self.user_id },
                start,
                end,
                status: self.status.unwrap_or(ReservationStatus::Active),
                notes: self.notes.trim().to_owned(),
            },
            resources: self.resources,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FieldError {
    NoResources,
    IncompleteTimeRange,
    EndNotAfterStart,
    MissingPurpose,
    MissingRequester,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FieldError::NoResources => "You must select at least one equipment item or a room.",
            FieldError::IncompleteTimeRange => "You must select a complete time range.",
            FieldError::EndNotAfterStart => "The end time must be after the start time.",
            FieldError::MissingPurpose => "You must state the purpose of the reservation.",
            FieldError::MissingRequester => {
                "You must select a user or mark the reservation as a guest booking."
            }
        })
    }
}

impl std::error::Error for FieldError {}
