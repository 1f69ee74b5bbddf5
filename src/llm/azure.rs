//! Azure OpenAI chat-completions client.
//!
//! One `ChatCompletion::chat` call is one HTTP attempt. Retries, backoff,
//! and rate limiting are layered on top by `CompletionClient`.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::CompletionConfig;
use super::types::{ChatCompletion, ChatRequest, CompletionError, ConversationTurn, GENERIC_FAILURE_MESSAGE};

pub struct AzureOpenAiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl AzureOpenAiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| CompletionError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, url: config.completions_url(), api_key: config.api_key.clone() })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl ChatCompletion for AzureOpenAiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        let body = WireRequest {
            messages: &request.messages,
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
            top_p: request.params.top_p,
            presence_penalty: request.params.presence_penalty,
        };

        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        debug!(status, body_len = text.len(), "azure: response received");

        if !(200..300).contains(&status) {
            let message = parse_error_message(&text).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            warn!(status, %message, "azure: error response");
            return Err(CompletionError::upstream(status, message));
        }
        parse_completion_response(status, &text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct WireRequest<'a> {
    messages: &'a [ConversationTurn],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    presence_penalty: f32,
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Pull `error.message` out of an error body, if there is one.
pub(crate) fn parse_error_message(json_text: &str) -> Option<String> {
    let root: Value = serde_json::from_str(json_text).ok()?;
    root.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_owned)
}

/// Extract `choices[0].message.content` from a 2xx body. An `error` object in
/// a 2xx body is still an upstream failure.
pub(crate) fn parse_completion_response(status: u16, json_text: &str) -> Result<String, CompletionError> {
    let root: Value =
        serde_json::from_str(json_text).map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

    if let Some(error) = root.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(GENERIC_FAILURE_MESSAGE);
        return Err(CompletionError::upstream(status, message));
    }

    root.get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| CompletionError::MalformedResponse("missing choices[0].message.content".to_string()))
}

#[cfg(test)]
#[path = "azure_test.rs"]
mod tests;
