//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The extension's scripts talk to the host over plain HTTP on localhost.
//! Every request is a tagged `Action` posted to one endpoint; the side panel
//! polls a second endpoint for selection events.

pub mod message;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Host routes with CORS open to the extension origin.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/message", post(message::post_message))
        .route("/api/events", get(message::poll_events))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
