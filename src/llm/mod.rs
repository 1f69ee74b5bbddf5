//! LLM: completion client for the financial assistant.
//!
//! DESIGN
//! ======
//! `CompletionClient` owns everything above a single HTTP attempt: payload
//! assembly (persona, history, context block), per-mode sampling parameters,
//! rate limiting, and retries. The attempt itself goes through the
//! `ChatCompletion` trait so tests can script responses.
//!
//! TRADE-OFFS
//! ==========
//! Every attempt, retries included, waits on the shared limiter. A retry
//! storm therefore cannot exceed the configured request rate, at the cost of
//! retries queueing behind unrelated requests.

pub mod azure;
pub mod config;
pub mod retry;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info};

use crate::rate_limit::RateLimiter;
use config::{CompletionConfig, DEFAULT_MAX_RETRIES, TokenLimits};
use retry::{RetryPolicy, retry_with_policy};
pub use types::ChatCompletion;
use types::{ChatRequest, CompletionError, ConversationTurn, SamplingParams};

pub const FINANCIAL_SYSTEM_PROMPT: &str = "You are an expert financial advisor and market analyst. Your role is to:
1. Analyze financial market data, trading information, and investment opportunities
2. Provide clear, actionable insights based on the webpage content
3. Help users understand market trends, risks, and potential opportunities
4. Offer balanced perspectives considering both potential gains and risks
5. Use technical analysis when relevant data is available
6. Consider market sentiment and news impact
7. Remind users about risk management principles";

/// Appended to the system prompt in full (side-panel) mode.
pub const ADVISORY_GUIDANCE: &str = "

Remember to:
- Always emphasize the importance of due diligence
- Mention that this is analysis, not financial advice
- Encourage diversification and risk management
- Point out both opportunities and potential risks
- Use clear, non-technical language when possible";

/// Appended to the system prompt in brief mode.
pub const BRIEF_DIRECTIVE: &str = "\nProvide very brief, concise responses.";

const TEMPERATURE: f32 = 0.7;

// =============================================================================
// REQUEST
// =============================================================================

/// Output shape. `Brief` is Quick Ask, `Full` is the side panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    Brief,
    #[default]
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub message: String,
    pub context: String,
    /// Prior turns, oldest first. Sent only in `Full` mode.
    pub history: Vec<ConversationTurn>,
    pub mode: CompletionMode,
    /// Overrides the client's default attempt count.
    pub max_retries: Option<usize>,
}

impl CompletionRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: String::new(),
            history: Vec::new(),
            mode: CompletionMode::Full,
            max_retries: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: CompletionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Content of the final user turn: `Context: ...\n\nQuestion: ...`, or
    /// the bare message when there is no context.
    #[must_use]
    pub fn user_content(&self) -> String {
        if self.context.trim().is_empty() {
            self.message.clone()
        } else {
            format!("Context: {}\n\nQuestion: {}", self.context, self.message)
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn ChatCompletion>,
    limiter: Option<RateLimiter>,
    token_limits: TokenLimits,
    max_retries: usize,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn ChatCompletion>) -> Self {
        Self { backend, limiter: None, token_limits: TokenLimits::default(), max_retries: DEFAULT_MAX_RETRIES }
    }

    /// Build an Azure-backed client from typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let backend = azure::AzureOpenAiClient::new(config)?;
        info!(url = backend.url(), "llm: azure completion client ready");
        Ok(Self::new(Arc::new(backend))
            .with_token_limits(config.token_limits)
            .with_max_retries(config.max_retries))
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn with_token_limits(mut self, token_limits: TokenLimits) -> Self {
        self.token_limits = token_limits;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn token_limits(&self) -> TokenLimits {
        self.token_limits
    }

    /// Sampling parameters for a mode.
    #[must_use]
    pub fn params_for(&self, mode: CompletionMode) -> SamplingParams {
        match mode {
            CompletionMode::Brief => SamplingParams {
                temperature: TEMPERATURE,
                max_tokens: self.token_limits.quick_ask,
                top_p: 0.5,
                presence_penalty: 0.6,
            },
            CompletionMode::Full => SamplingParams {
                temperature: TEMPERATURE,
                max_tokens: self.token_limits.sidebar,
                top_p: 1.0,
                presence_penalty: 0.0,
            },
        }
    }

    /// Assemble the wire request: system turn, history (full mode only), user turn.
    #[must_use]
    pub fn build_chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let system = match request.mode {
            CompletionMode::Brief => format!("{FINANCIAL_SYSTEM_PROMPT}{BRIEF_DIRECTIVE}"),
            CompletionMode::Full => format!("{FINANCIAL_SYSTEM_PROMPT}{ADVISORY_GUIDANCE}"),
        };

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ConversationTurn::system(system));
        if request.mode == CompletionMode::Full {
            messages.extend(request.history.iter().cloned());
        }
        messages.push(ConversationTurn::user(request.user_content()));

        ChatRequest { messages, params: self.params_for(request.mode) }
    }

    /// Run a completion with rate limiting and retries.
    ///
    /// # Errors
    ///
    /// Returns the final attempt's [`CompletionError`] once retries are
    /// exhausted.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let chat_request = self.build_chat_request(request);
        let policy = RetryPolicy::completion(request.max_retries.unwrap_or(self.max_retries));
        debug!(
            mode = ?request.mode,
            turns = chat_request.messages.len(),
            max_attempts = policy.max_attempts(),
            "llm: completion requested"
        );

        retry_with_policy(&policy, |attempt| {
            let chat_request = &chat_request;
            async move {
                if let Some(limiter) = &self.limiter {
                    let waited = limiter.wait_for_availability().await;
                    if !waited.is_zero() {
                        debug!(attempt, waited_ms = waited.as_millis(), "llm: rate limiter delayed attempt");
                    }
                }
                self.backend.chat(chat_request).await
            }
        })
        .await
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
