//! Extension message endpoints.

use axum::extract::State;
use axum::response::Json;

use crate::router::{Action, Event, Response};
use crate::state::AppState;

/// `POST /api/message`: dispatch one action.
pub async fn post_message(State(state): State<AppState>, Json(action): Json<Action>) -> Json<Response> {
    Json(state.router.dispatch(action).await)
}

/// `GET /api/events`: side-panel events queued since the last poll.
pub async fn poll_events(State(state): State<AppState>) -> Json<Vec<Event>> {
    Json(state.drain_events().await)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
