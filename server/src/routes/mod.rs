use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    build_report, get_event, health_check, issue_ticket, list_events, publish_event,
    redeem_ticket, register_venue,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let venues = Router::new()
        .route("/:venue_id", put(register_venue))
        .route("/:venue_id/events", post(publish_event))
        .route("/:venue_id/events/:date", get(list_events))
        .route("/:venue_id/events/:date/:event_name", get(get_event))
        .route("/:venue_id/events/:date/:event_name/tickets", post(issue_ticket))
        .route("/:venue_id/redemptions", post(redeem_ticket))
        .route("/:venue_id/reports", post(build_report));

    Router::new()
        .route("/health", get(health_check))
        .nest("/venues", venues)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
}
