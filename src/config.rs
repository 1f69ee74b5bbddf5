//! Host configuration parsed from environment variables.
//!
//! Every knob has a default except the completion endpoint settings, which
//! live in `llm::config` and are allowed to be absent (the host then starts
//! with AI actions disabled).

use std::net::{IpAddr, Ipv4Addr};

use crate::detector::{StoredTooltipConfig, TooltipConfig, parse_include_tags};

pub const DEFAULT_PORT: u16 = 3917;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing config: env var {var} not set")]
    MissingVar { var: String },

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(String),
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingVar { .. } => "E_CONFIG_MISSING",
            Self::Parse(_) => "E_CONFIG_PARSE",
        }
    }
}

// =============================================================================
// HOST CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Escape raw HTML in model output before rendering.
    pub escape_model_html: bool,
    pub tooltip: TooltipConfig,
}

impl HostConfig {
    /// Build host config from environment variables.
    ///
    /// - `BIND_ADDR`: default `127.0.0.1`
    /// - `PORT`: default 3917
    /// - `ESCAPE_MODEL_HTML`: `true`/`1` to escape, default off
    /// - `TOOLTIP_INCLUDE_TAGS`: comma list of tag names, default set when absent
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR` or `PORT` is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse::<IpAddr>()
                .map_err(|e| ConfigError::Parse(format!("BIND_ADDR '{raw}': {e}")))?,
            Err(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::Parse(format!("PORT '{raw}': {e}")))?,
            Err(_) => DEFAULT_PORT,
        };
        let stored = StoredTooltipConfig {
            include_tags: std::env::var("TOOLTIP_INCLUDE_TAGS")
                .ok()
                .map(|raw| parse_include_tags(&raw)),
            show_text: None,
        };

        Ok(Self {
            bind_addr,
            port,
            escape_model_html: env_flag("ESCAPE_MODEL_HTML"),
            tooltip: TooltipConfig::merged(&stored),
        })
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            escape_model_html: false,
            tooltip: TooltipConfig::default(),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Parse `key` from the environment, falling back to `default` when the
/// variable is unset or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Serializes tests that mutate the process environment, across modules.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
