use axum::response::Response;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::VenueId;
use crate::store::path::parse_day_key;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod events;
pub mod redemptions;
pub mod reports;
pub mod tickets;
pub mod venues;

pub use events::{get_event, list_events, publish_event};
pub use redemptions::redeem_ticket;
pub use reports::build_report;
pub use tickets::issue_ticket;
pub use venues::register_venue;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "nightpass-server",
    };

    success(payload, "Health check successful")
}

fn venue_from_path(raw: &str) -> Result<VenueId, AppError> {
    let venue_id = VenueId::new(raw);
    if venue_id.is_blank() {
        return Err(AppError::ValidationError("Venue id must not be empty".to_string()));
    }
    Ok(venue_id)
}

/// ISO dates, or the ledger's own `dd-MM-yyyy` partition keys.
fn date_from_path(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_day_key(raw))
        .ok_or_else(|| {
            AppError::ValidationError(format!("'{raw}' is not a date, expected YYYY-MM-DD"))
        })
}
