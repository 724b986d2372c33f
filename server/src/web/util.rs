use crate::data_store::ReservationFilter;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Query parameters of the reservation list endpoint, to be deserialized with
/// [actix_web::web::Query].
#[derive(Deserialize, Default)]
pub struct ReservationFilterAsQuery {
    #[serde(default, alias = "user_id")]
    pub user: Option<i32>,
    #[serde(default)]
    pub status: Option<classy_api_types::ReservationStatus>,
    #[serde(default)]
    pub after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
}

impl From<ReservationFilterAsQuery> for ReservationFilter {
    fn from(value: ReservationFilterAsQuery) -> Self {
        ReservationFilter {
            user_id: value.user,
            status: value.status.map(|s| s.into()),
            after: value.after,
            before: value.before,
        }
    }
}

/// Query parameters of the equipment search endpoint
#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}
