use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::venue_from_path;
use crate::models::Venue;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct RegisterVenueRequest {
    pub name: String,
}

pub async fn register_venue(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(body): Json<RegisterVenueRequest>,
) -> Result<Response, AppError> {
    let venue = Venue {
        id: venue_from_path(&venue_id)?,
        name: body.name.trim().to_string(),
    };
    if venue.name.is_empty() {
        return Err(AppError::ValidationError("Venue name must not be empty".to_string()));
    }

    state.catalog.register_venue(&venue).await?;
    Ok(success(venue, "Venue registered"))
}
