use crate::data_store::models::ReservationStatus;
use std::fmt::{Display, Formatter};

/// Check if a reservation may change from status `from` to status `to`.
///
/// Pending reservations can be activated, active ones can be cancelled or completed (returned).
/// Cancelled and completed reservations are final. Keeping the current status is always allowed.
pub fn check_transition(
    from: ReservationStatus,
    to: ReservationStatus,
) -> Result<(), StatusTransitionError> {
    use ReservationStatus::*;
    match (from, to) {
        (a, b) if a == b => Ok(()),
        (Pending, Active) | (Active, Cancelled) | (Active, Completed) => Ok(()),
        _ => Err(StatusTransitionError { from, to }),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StatusTransitionError {
    pub from: ReservationStatus,
    pub to: ReservationStatus,
}

impl Display for StatusTransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "The status of a {} reservation cannot be changed to {}.",
            self.from.name(),
            self.to.name()
        )
    }
}

impl std::error::Error for StatusTransitionError {}
