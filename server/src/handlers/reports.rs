use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::venue_from_path;
use crate::models::EventKey;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub events: Vec<EventKey>,
}

pub async fn build_report(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(body): Json<ReportRequest>,
) -> Result<Response, AppError> {
    let venue_id = venue_from_path(&venue_id)?;
    if body.events.is_empty() {
        return Err(AppError::ValidationError("Select at least one event".to_string()));
    }
    let events: Vec<EventKey> = body
        .events
        .into_iter()
        .map(|key| EventKey::new(key.date, key.name))
        .collect();

    let report = state.aggregator.aggregate(&venue_id, &events).await?;
    Ok(success(report, "Report generated"))
}
