use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use super::venue_from_path;
use crate::models::RedemptionOutcome;
use crate::services::codec;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{success, with_status};

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Text decoded from the scan code.
    pub payload: String,
}

/// Redeems against the configured operating day. `INVALID` and
/// `ALREADY_USED` are ordinary answers; only `LOOKUP_ERROR` is a 503.
pub async fn redeem_ticket(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(body): Json<RedeemRequest>,
) -> Result<Response, AppError> {
    let venue_id = venue_from_path(&venue_id)?;

    let outcome = match codec::decode(&body.payload) {
        Ok(code) => {
            state
                .gate
                .redeem(&venue_id, state.scan.operating_day(), &code)
                .await
        }
        Err(err) => {
            info!(venue_id = %venue_id, error = %err, "INVALID (unreadable payload)");
            RedemptionOutcome::Invalid
        }
    };

    info!(venue_id = %venue_id, result = outcome.label(), "Redemption answered");
    let message = outcome.message();
    Ok(match outcome {
        RedemptionOutcome::LookupError => with_status(StatusCode::SERVICE_UNAVAILABLE, outcome, message),
        _ => success(outcome, message),
    })
}
