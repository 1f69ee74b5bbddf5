//! LLM types: conversation turns, sampling parameters, and errors.
//!
//! Provider-neutral types shared by the Azure client, the retry combinator,
//! and the conversation session.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Message substituted when an error response carries no readable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to get response from the completion endpoint";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by completion calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// The endpoint answered with a non-2xx status or an `error` payload.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// An upstream failure that reports rate limiting. Triggers backoff.
    #[error("{message}")]
    RateLimited { status: u16, message: String },

    /// A 2xx response without `choices[0].message.content`.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("completion request failed: {0}")]
    Transport(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl CompletionError {
    /// Classify an upstream failure: HTTP 429 or a message mentioning
    /// "rate limit" becomes `RateLimited`, anything else `Upstream`.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || message.to_ascii_lowercase().contains("rate limit") {
            Self::RateLimited { status, message }
        } else {
            Self::Upstream { status, message }
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl ErrorCode for CompletionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Upstream { .. } => "E_UPSTREAM",
            Self::RateLimited { .. } => "E_RATE_LIMITED",
            Self::MalformedResponse(_) => "E_MALFORMED_RESPONSE",
            Self::Transport(_) => "E_TRANSPORT",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport(_) | Self::Upstream { status: 500..=599, .. })
    }
}

// =============================================================================
// CONVERSATION TURNS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation. Serializes to the chat wire shape
/// `{"role": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Numeric generation parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub presence_penalty: f32,
}

/// A fully assembled chat request: system turn first, user turn last.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ConversationTurn>,
    pub params: SamplingParams,
}

// =============================================================================
// CHAT COMPLETION TRAIT
// =============================================================================

/// One attempt against a chat completion endpoint. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send the request and return the first choice's text.
    ///
    /// # Errors
    ///
    /// Returns a [`CompletionError`] if the request fails or the response is
    /// malformed.
    async fn chat(&self, request: &ChatRequest) -> Result<String, CompletionError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
