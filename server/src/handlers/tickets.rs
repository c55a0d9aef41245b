use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{date_from_path, venue_from_path};
use crate::models::{EventKey, Holder, PaymentMetadata, Ticket};
use crate::services::{codec, TicketRequest};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::created;

#[derive(Debug, Deserialize)]
pub struct IssueTicketRequest {
    pub ticket_type: String,
    pub holder_name: String,
    pub holder_email: String,
    #[serde(default)]
    pub payment: Option<PaymentMetadata>,
}

/// A persisted ticket and the text its scan code carries.
#[derive(Debug, Serialize)]
pub struct IssuedTicket {
    pub ticket: Ticket,
    pub payload: String,
}

pub async fn issue_ticket(
    State(state): State<AppState>,
    Path((venue_id, date, event_name)): Path<(String, String, String)>,
    Json(body): Json<IssueTicketRequest>,
) -> Result<Response, AppError> {
    let venue_id = venue_from_path(&venue_id)?;
    let key = EventKey::new(date_from_path(&date)?, event_name);
    let request = TicketRequest {
        ticket_type: body.ticket_type,
        holder: Holder {
            name: body.holder_name,
            email: body.holder_email,
        },
        payment: body.payment,
    };

    let ticket = state.allocator.allocate(&venue_id, &key, request).await?;
    let payload = codec::encode(&ticket);
    Ok(created(IssuedTicket { ticket, payload }, "Ticket issued"))
}
