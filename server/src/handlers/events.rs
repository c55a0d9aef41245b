use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{date_from_path, venue_from_path};
use crate::models::{EventInfo, EventKey, EventListing, TicketType};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub info: EventInfo,
    #[serde(default)]
    pub ticket_types: BTreeMap<String, TicketType>,
}

#[derive(Debug, Serialize)]
pub struct EventsOnDay {
    pub date: NaiveDate,
    pub events: Vec<String>,
}

pub async fn publish_event(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(body): Json<PublishEventRequest>,
) -> Result<Response, AppError> {
    let venue_id = venue_from_path(&venue_id)?;
    let listing = EventListing {
        key: EventKey::new(body.date, body.name),
        info: body.info,
        ticket_types: body.ticket_types,
    };

    state.catalog.publish_event(&venue_id, &listing).await?;
    Ok(created(listing, "Event published"))
}

pub async fn list_events(
    State(state): State<AppState>,
    Path((venue_id, date)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let venue_id = venue_from_path(&venue_id)?;
    let date = date_from_path(&date)?;

    let events = state.catalog.list_events(&venue_id, date).await?;
    Ok(success(EventsOnDay { date, events }, "Events retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path((venue_id, date, event_name)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let venue_id = venue_from_path(&venue_id)?;
    let key = EventKey::new(date_from_path(&date)?, event_name);

    match state.catalog.event(&venue_id, &key).await? {
        Some(listing) => Ok(success(listing, "Event retrieved")),
        None => Err(AppError::NotFound(format!("Event {key} was not found"))),
    }
}
