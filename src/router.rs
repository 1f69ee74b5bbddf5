//! Message router: dispatches UI actions to the core.
//!
//! DESIGN
//! ======
//! Every request from the content script, tooltip, options page, or side
//! panel arrives as one `Action` variant. Handlers are plain business logic
//! returning `Result<Response, RouterError>`; `dispatch` owns the response shape
//! each surface expects:
//!
//! - Quick Ask (`chat`): `{answer}` or `{error}`
//! - everything else: `{success: true, ...}` or `{success: false, error}`
//!
//! Selections travel to the side panel as `Event`s on a bounded mpsc channel.
//! Sends never wait: a full queue (the panel stopped polling) and a closed
//! channel (the panel is gone) both fail the request immediately.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::context::{ActiveTab, ContentExtractionError, PageContextSource, PageDocument, SnapshotSummary};
use crate::detector::{
    ElementSnapshot, FinancialAnalysis, Point, Size, StoredTooltipConfig, TooltipConfig, analyze_financial_content,
    parse_include_tags, position_tooltip, should_show_tooltip, tooltip_html,
};
use crate::error::ErrorCode;
use crate::llm::types::CompletionError;
use crate::llm::{CompletionClient, CompletionMode, CompletionRequest};
use crate::session::{Session, SessionError};

/// Prefix that steers Quick Ask toward a short answer.
pub const QUICK_ASK_PREFIX: &str = "Please provide a brief and concise response in 2-3 sentences: ";

/// Capacity of the side-panel event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// ACTIONS
// =============================================================================

/// Where a tooltip is about to be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Placement {
    pub pointer: Point,
    pub tooltip: Size,
    pub viewport: Size,
}

/// Every request kind the host accepts, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// Text selected in the page, forwarded to the side panel.
    AnalyzeText { text: String },
    /// Quick Ask from the tooltip.
    Chat {
        prompt: String,
        #[serde(default)]
        context: String,
    },
    /// Side-panel conversation turn.
    SidebarChat {
        prompt: String,
        #[serde(default)]
        context: String,
    },
    /// Report the active page (when given) and start a fresh conversation on it.
    GrabContent {
        #[serde(default)]
        page: Option<PageDocument>,
    },
    ResetConversation,
    GetTooltipConfig,
    #[serde(rename_all = "camelCase")]
    SaveTooltipConfig {
        /// Comma-separated tag names as typed in the options page.
        include_tags: String,
        #[serde(default)]
        show_text: Option<bool>,
    },
    /// Run the detector on a hovered element.
    Inspect {
        tag: String,
        text: String,
        #[serde(default)]
        placement: Option<Placement>,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Self::AnalyzeText { .. } => "analyzeText",
            Self::Chat { .. } => "chat",
            Self::SidebarChat { .. } => "sidebarChat",
            Self::GrabContent { .. } => "grabContent",
            Self::ResetConversation => "resetConversation",
            Self::GetTooltipConfig => "getTooltipConfig",
            Self::SaveTooltipConfig { .. } => "saveTooltipConfig",
            Self::Inspect { .. } => "inspect",
        }
    }
}

/// Pushed to the side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Event {
    TextSelected { text: String },
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Wire response. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SnapshotSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip_config: Option<TooltipConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<FinancialAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl Response {
    fn ok() -> Self {
        Self { success: Some(true), ..Self::default() }
    }

    fn failed(err: &RouterError) -> Self {
        Self {
            success: Some(false),
            error: Some(err.to_string()),
            code: Some(err.error_code().to_string()),
            retryable: Some(err.retryable()),
            ..Self::default()
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// The side-panel channel is closed.
    #[error("message channel unavailable: {0}")]
    Transport(String),

    /// The side panel has not drained its queue.
    #[error("side-panel queue is full ({0} pending events)")]
    QueueFull(usize),

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Extraction(#[from] ContentExtractionError),

    #[error("settings: {0}")]
    Settings(String),

    #[error("completion endpoint is not configured")]
    NotConfigured,
}

impl ErrorCode for RouterError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT_CLOSED",
            Self::QueueFull(_) => "E_QUEUE_FULL",
            Self::EmptyPrompt => "E_EMPTY_PROMPT",
            Self::Completion(e) => e.error_code(),
            Self::Session(e) => e.error_code(),
            Self::Extraction(e) => e.error_code(),
            Self::Settings(_) => "E_SETTINGS",
            Self::NotConfigured => "E_LLM_NOT_CONFIGURED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Completion(e) => e.retryable(),
            Self::Session(e) => e.retryable(),
            Self::QueueFull(_) => true,
            Self::EmptyPrompt | Self::Transport(_) | Self::Extraction(_) | Self::Settings(_) | Self::NotConfigured => false,
        }
    }
}

// =============================================================================
// SETTINGS STORE
// =============================================================================

/// Persists the tooltip settings the options page saves.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> StoredTooltipConfig;

    /// # Errors
    ///
    /// Returns [`RouterError::Settings`] if the settings cannot be written.
    async fn save(&self, config: StoredTooltipConfig) -> Result<(), RouterError>;
}

/// In-process settings, seeded from host config.
#[derive(Default)]
pub struct MemorySettings {
    stored: RwLock<StoredTooltipConfig>,
}

impl MemorySettings {
    #[must_use]
    pub fn new(initial: StoredTooltipConfig) -> Self {
        Self { stored: RwLock::new(initial) }
    }

    /// Seed with every field of an already-merged config.
    #[must_use]
    pub fn from_config(config: &TooltipConfig) -> Self {
        Self::new(StoredTooltipConfig {
            include_tags: Some(config.include_tags.iter().cloned().collect()),
            show_text: Some(config.show_text),
        })
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettings {
    async fn load(&self) -> StoredTooltipConfig {
        self.stored.read().await.clone()
    }

    async fn save(&self, config: StoredTooltipConfig) -> Result<(), RouterError> {
        *self.stored.write().await = config;
        Ok(())
    }
}

// =============================================================================
// ROUTER
// =============================================================================

pub struct Router {
    completion: Option<CompletionClient>,
    session: Option<Session>,
    active_tab: ActiveTab,
    settings: Arc<dyn SettingsStore>,
    selection: RwLock<Option<String>>,
    events: mpsc::Sender<Event>,
}

impl Router {
    /// Build a router. Without a completion client, AI actions answer with
    /// `E_LLM_NOT_CONFIGURED` and everything else still works.
    pub fn new(
        completion: Option<CompletionClient>,
        active_tab: ActiveTab,
        settings: Arc<dyn SettingsStore>,
        events: mpsc::Sender<Event>,
    ) -> Self {
        let session = completion
            .clone()
            .map(|client| Session::new(client, Arc::new(active_tab.clone())));
        Self { completion, session, active_tab, settings, selection: RwLock::new(None), events }
    }

    /// Escape raw HTML in side-panel answers.
    #[must_use]
    pub fn with_html_escaping(mut self, escape_html: bool) -> Self {
        self.session = self.session.map(|s| s.with_html_escaping(escape_html));
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn ai_enabled(&self) -> bool {
        self.completion.is_some()
    }

    pub async fn last_selection(&self) -> Option<String> {
        self.selection.read().await.clone()
    }

    /// Handle one action and shape the reply for its surface.
    pub async fn dispatch(&self, action: Action) -> Response {
        let name = action.name();
        let span = info_span!("dispatch", action = name, request_id = %Uuid::new_v4());
        async move {
            debug!("router: dispatching");
            let quick_ask = matches!(action, Action::Chat { .. });
            match self.handle(action).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, code = e.error_code(), "router: action failed");
                    if quick_ask {
                        Response { error: Some(e.to_string()), code: Some(e.error_code().to_string()), ..Response::default() }
                    } else {
                        Response::failed(&e)
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run an action without shaping errors.
    ///
    /// # Errors
    ///
    /// Returns the [`RouterError`] of the failing collaborator.
    pub async fn handle(&self, action: Action) -> Result<Response, RouterError> {
        match action {
            Action::AnalyzeText { text } => self.analyze_text(text).await,
            Action::Chat { prompt, context } => self.quick_ask(&prompt, context).await,
            Action::SidebarChat { prompt, context } => self.sidebar_chat(&prompt, &context).await,
            Action::GrabContent { page } => self.grab_content(page).await,
            Action::ResetConversation => {
                if let Some(session) = &self.session {
                    session.reset().await;
                }
                Ok(Response::ok())
            }
            Action::GetTooltipConfig => {
                Ok(Response { tooltip_config: Some(self.tooltip_config().await), ..Response::ok() })
            }
            Action::SaveTooltipConfig { include_tags, show_text } => {
                self.save_tooltip_config(&include_tags, show_text).await
            }
            Action::Inspect { tag, text, placement } => Ok(self.inspect(tag, text, placement).await),
        }
    }

    /// Stored settings merged over defaults.
    pub async fn tooltip_config(&self) -> TooltipConfig {
        TooltipConfig::merged(&self.settings.load().await)
    }

    async fn analyze_text(&self, text: String) -> Result<Response, RouterError> {
        *self.selection.write().await = Some(text.clone());
        let len = text.len();
        self.events.try_send(Event::TextSelected { text }).map_err(|e| match e {
            TrySendError::Full(_) => RouterError::QueueFull(self.events.max_capacity()),
            TrySendError::Closed(_) => RouterError::Transport("side panel is not listening".into()),
        })?;
        info!(len, "router: selection forwarded to side panel");
        Ok(Response::ok())
    }

    async fn quick_ask(&self, prompt: &str, context: String) -> Result<Response, RouterError> {
        if prompt.trim().is_empty() {
            return Err(RouterError::EmptyPrompt);
        }
        let client = self.completion.as_ref().ok_or(RouterError::NotConfigured)?;
        let request = CompletionRequest::new(format!("{QUICK_ASK_PREFIX}{prompt}"))
            .with_context(context)
            .with_mode(CompletionMode::Brief);
        let answer = client.complete(&request).await?;
        Ok(Response { answer: Some(answer), ..Response::default() })
    }

    async fn sidebar_chat(&self, prompt: &str, context: &str) -> Result<Response, RouterError> {
        if prompt.trim().is_empty() {
            return Err(RouterError::EmptyPrompt);
        }
        let session = self.session.as_ref().ok_or(RouterError::NotConfigured)?;
        let context = if context.trim().is_empty() { self.last_selection().await.unwrap_or_default() } else { context.to_string() };
        let reply = session.send_turn(prompt, &context).await?;
        Ok(Response { answer: Some(reply.answer), formatted_answer: Some(reply.formatted_answer), ..Response::ok() })
    }

    async fn grab_content(&self, page: Option<PageDocument>) -> Result<Response, RouterError> {
        if let Some(page) = page {
            self.active_tab.report(page).await;
        }
        let summary = match &self.session {
            Some(session) => session.grab_context().await?,
            None => SnapshotSummary::from(&self.active_tab.capture().await?),
        };
        Ok(Response { summary: Some(summary), ..Response::ok() })
    }

    async fn save_tooltip_config(&self, raw_tags: &str, show_text: Option<bool>) -> Result<Response, RouterError> {
        let stored = StoredTooltipConfig {
            include_tags: Some(parse_include_tags(raw_tags)),
            show_text: Some(show_text.unwrap_or(true)),
        };
        self.settings.save(stored).await?;
        let config = self.tooltip_config().await;
        info!(tags = config.include_tags.len(), show_text = config.show_text, "router: tooltip settings saved");
        Ok(Response { tooltip_config: Some(config), ..Response::ok() })
    }

    async fn inspect(&self, tag: String, text: String, placement: Option<Placement>) -> Response {
        let config = self.tooltip_config().await;
        let element = ElementSnapshot::new(tag, text);
        if !should_show_tooltip(&config, &element) {
            return Response::ok();
        }
        let Some(analysis) = analyze_financial_content(&element) else {
            return Response::ok();
        };
        Response {
            tooltip_html: Some(tooltip_html(&analysis)),
            analysis: Some(analysis),
            position: placement.map(|p| position_tooltip(p.pointer, p.tooltip, p.viewport)),
            ..Response::ok()
        }
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
