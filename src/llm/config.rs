//! Completion endpoint configuration parsed from environment variables.

use crate::config::{ConfigError, env_parse};

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_API_KEY_ENV: &str = "AZURE_OPENAI_KEY";
pub const DEFAULT_LLM_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUICK_ASK_MAX_TOKENS: u32 = 150;
pub const DEFAULT_SIDEBAR_MAX_TOKENS: u32 = 800;
pub const DEFAULT_MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for LlmTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_LLM_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_LLM_CONNECT_TIMEOUT_SECS }
    }
}

/// Output budgets for the two chat modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    pub quick_ask: u32,
    pub sidebar: u32,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self { quick_ask: DEFAULT_QUICK_ASK_MAX_TOKENS, sidebar: DEFAULT_SIDEBAR_MAX_TOKENS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    /// Resource endpoint without trailing slash, e.g. `https://acme.openai.azure.com`.
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
    pub timeouts: LlmTimeouts,
    pub token_limits: TokenLimits,
    pub max_retries: usize,
}

impl CompletionConfig {
    /// Build typed completion config from environment variables.
    ///
    /// Required:
    /// - `AZURE_OPENAI_ENDPOINT`
    /// - `AZURE_DEPLOYMENT_NAME`
    /// - the key itself, in the env var named by `LLM_API_KEY_ENV`
    ///   (default `AZURE_OPENAI_KEY`)
    ///
    /// Optional:
    /// - `AZURE_API_VERSION`: default `2024-02-15-preview`
    /// - `LLM_REQUEST_TIMEOUT_SECS`: default 120
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    /// - `QUICK_ASK_MAX_TOKENS`: default 150
    /// - `SIDEBAR_MAX_TOKENS`: default 800
    /// - `LLM_MAX_RETRIES`: default 3
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = required("AZURE_OPENAI_ENDPOINT")?
            .trim_end_matches('/')
            .to_string();
        let deployment = required("AZURE_DEPLOYMENT_NAME")?;
        let api_version = std::env::var("AZURE_API_VERSION").unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        let key_var = std::env::var("LLM_API_KEY_ENV").unwrap_or_else(|_| DEFAULT_API_KEY_ENV.to_string());
        let api_key = required(&key_var)?;

        let timeouts = LlmTimeouts {
            request_secs: env_parse("LLM_REQUEST_TIMEOUT_SECS", DEFAULT_LLM_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("LLM_CONNECT_TIMEOUT_SECS", DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
        };
        let token_limits = TokenLimits {
            quick_ask: env_parse("QUICK_ASK_MAX_TOKENS", DEFAULT_QUICK_ASK_MAX_TOKENS),
            sidebar: env_parse("SIDEBAR_MAX_TOKENS", DEFAULT_SIDEBAR_MAX_TOKENS),
        };

        Ok(Self {
            endpoint,
            deployment,
            api_version,
            api_key,
            timeouts,
            token_limits,
            max_retries: env_parse("LLM_MAX_RETRIES", DEFAULT_MAX_RETRIES),
        })
    }

    /// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

fn required(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar { var: var.to_string() }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
