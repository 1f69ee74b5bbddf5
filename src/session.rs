//! Conversation session: side-panel chat state.
//!
//! DESIGN
//! ======
//! A `Session` owns the conversation history, the first-message flag, the
//! cached page snapshot, and a generation counter. The host holds one per
//! side panel and passes it by reference; nothing lives at process scope.
//!
//! The state mutex is released while the completion call is in flight. Each
//! `send_turn` and `reset` bumps the generation, and a reply that comes back
//! under an older generation is dropped instead of being appended.
//!
//! TRADE-OFFS
//! ==========
//! The stored user turn is the bare question. The page context block and any
//! selection ride on the outbound request only, so follow-up turns do not
//! resend the page; the model sees the page data once, on the first turn.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::context::{ContentExtractionError, PageContextSource, PageSnapshot, SnapshotSummary, format_financial_context};
use crate::error::ErrorCode;
use crate::llm::types::{CompletionError, ConversationTurn};
use crate::llm::{CompletionClient, CompletionMode, CompletionRequest};
use crate::markdown;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// The session was reset or re-sent while this turn was in flight.
    #[error("response superseded by a newer request")]
    Superseded,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Completion(e) => e.error_code(),
            Self::Superseded => "E_SUPERSEDED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Completion(e) => e.retryable(),
            Self::Superseded => false,
        }
    }
}

/// A completed turn: raw markdown plus rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    pub answer: String,
    pub formatted_answer: String,
}

struct SessionState {
    history: Vec<ConversationTurn>,
    first_message: bool,
    snapshot: Option<Arc<PageSnapshot>>,
    generation: u64,
}

impl SessionState {
    fn new() -> Self {
        Self { history: Vec::new(), first_message: true, snapshot: None, generation: 0 }
    }

    fn clear(&mut self) {
        self.history.clear();
        self.first_message = true;
        self.snapshot = None;
        self.generation += 1;
    }
}

pub struct Session {
    client: CompletionClient,
    pages: Arc<dyn PageContextSource>,
    escape_html: bool,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(client: CompletionClient, pages: Arc<dyn PageContextSource>) -> Self {
        Self { client, pages, escape_html: false, state: Mutex::new(SessionState::new()) }
    }

    /// Escape raw HTML in answers before rendering.
    #[must_use]
    pub fn with_html_escaping(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    /// Send one user turn and return the rendered answer.
    ///
    /// On the first turn the page snapshot (cached, or captured now) is
    /// prepended to the context. A capture failure is logged and the turn
    /// goes out without it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Completion`] when the completion fails after
    /// retries, and [`SessionError::Superseded`] when the session was reset
    /// or re-sent before the reply arrived.
    pub async fn send_turn(&self, text: &str, selected_context: &str) -> Result<TurnReply, SessionError> {
        let (generation, first_message, cached, history) = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            (state.generation, state.first_message, state.snapshot.clone(), state.history.clone())
        };

        let snapshot = if first_message { self.first_turn_snapshot(cached, generation).await } else { None };
        let mut context_parts = Vec::new();
        if let Some(snapshot) = snapshot {
            context_parts.push(format_financial_context(&snapshot));
        }
        if !selected_context.trim().is_empty() {
            context_parts.push(selected_context.to_string());
        }

        let request = CompletionRequest::new(text)
            .with_context(context_parts.join("\n"))
            .with_history(history)
            .with_mode(CompletionMode::Full);
        let answer = self.client.complete(&request).await?;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            warn!(generation, current = state.generation, "session: discarding stale reply");
            return Err(SessionError::Superseded);
        }
        state.history.push(ConversationTurn::user(text));
        state.history.push(ConversationTurn::assistant(answer.clone()));
        state.first_message = false;
        debug!(generation, turns = state.history.len(), "session: turn appended");
        drop(state);

        let formatted_answer = if self.escape_html { markdown::render_escaped(&answer) } else { markdown::render(&answer) };
        Ok(TurnReply { answer, formatted_answer })
    }

    async fn first_turn_snapshot(&self, cached: Option<Arc<PageSnapshot>>, generation: u64) -> Option<Arc<PageSnapshot>> {
        if let Some(snapshot) = cached {
            return Some(snapshot);
        }
        match self.pages.capture().await {
            Ok(snapshot) => {
                info!(url = %snapshot.url, terms = snapshot.matched_terms.len(), "session: page context captured");
                let snapshot = Arc::new(snapshot);
                let mut state = self.state.lock().await;
                if state.generation == generation {
                    state.snapshot = Some(Arc::clone(&snapshot));
                }
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "session: page context unavailable, sending bare question");
                None
            }
        }
    }

    /// Return to the initial first-message-pending state. Idempotent.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.clear();
        info!(generation = state.generation, "session: reset");
    }

    /// Capture a fresh snapshot and start a new conversation around it.
    ///
    /// # Errors
    ///
    /// Returns [`ContentExtractionError`] if no page is available; the
    /// session is left untouched in that case.
    pub async fn grab_context(&self) -> Result<SnapshotSummary, ContentExtractionError> {
        let snapshot = Arc::new(self.pages.capture().await?);
        let summary = SnapshotSummary::from(snapshot.as_ref());

        let mut state = self.state.lock().await;
        state.clear();
        state.snapshot = Some(snapshot);
        info!(url = %summary.url, generation = state.generation, "session: context grabbed");
        Ok(summary)
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.state.lock().await.history.clone()
    }

    pub async fn is_first_message(&self) -> bool {
        self.state.lock().await.first_message
    }

    pub async fn snapshot(&self) -> Option<Arc<PageSnapshot>> {
        self.state.lock().await.snapshot.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
