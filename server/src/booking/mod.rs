//! Rules for admitting reservations
//!
//! Every path that writes a reservation (booking by a user, booking by an admin, editing) goes
//! through the same steps: the request's resource references are normalized into a
//! [ResourceSet], the fields are checked with [fields::ReservationDraft::check_fields], status
//! changes are checked with [status::check_transition] and finally the candidate is checked for
//! double bookings with [conflict::validate] against a fresh list of reservations.
//!
//! Nothing in this module performs I/O.

pub mod conflict;
pub mod fields;
mod resources;
pub mod status;

pub use conflict::{validate, Candidate, Decision};
pub use fields::{FieldError, ReservationDraft};
pub use resources::ResourceSet;
