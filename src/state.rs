//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the message router and the receiving end of the side-panel event
//! channel, which the panel drains by polling.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::context::ActiveTab;
use crate::detector::TooltipConfig;
use crate::llm::CompletionClient;
use crate::router::{EVENT_CHANNEL_CAPACITY, Event, MemorySettings, Router};

/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub events: Arc<Mutex<mpsc::Receiver<Event>>>,
}

impl AppState {
    /// Wire a router with its own active tab, in-memory settings seeded from
    /// `tooltip`, and event channel.
    #[must_use]
    pub fn new(completion: Option<CompletionClient>, tooltip: &TooltipConfig, escape_model_html: bool) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let settings = Arc::new(MemorySettings::from_config(tooltip));
        let router = Router::new(completion, ActiveTab::new(), settings, tx).with_html_escaping(escape_model_html);
        Self { router: Arc::new(router), events: Arc::new(Mutex::new(rx)) }
    }

    /// Take every event queued for the side panel without waiting.
    pub async fn drain_events(&self) -> Vec<Event> {
        let mut rx = self.events.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}
