//! Sliding-window pacing for outbound completion calls.
//!
//! DESIGN
//! ======
//! Admission timestamps live in a `VecDeque<Instant>` pruned on every call.
//! When the window is saturated, `wait_for_availability` sleeps exactly until
//! the oldest admission leaves the window, then records the new one.
//!
//! Prune, wait, and push all happen under one async mutex, so the limiter is
//! a single writer: concurrent callers queue on the lock and are admitted one
//! at a time. The lock stays held across the sleep, so no later caller can
//! take the slot a sleeper is waiting for.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::env_parse;

pub const DEFAULT_MAX_REQUESTS: usize = 3;
pub const DEFAULT_WINDOW_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitConfig {
    /// Read `RATE_LIMIT_MAX_REQUESTS` and `RATE_LIMIT_WINDOW_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS),
            window: Duration::from_millis(env_parse("RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS)),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: DEFAULT_MAX_REQUESTS, window: Duration::from_millis(DEFAULT_WINDOW_MS) }
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Cloneable handle; clones share the same window.
#[derive(Clone)]
pub struct RateLimiter {
    admitted: Arc<Mutex<VecDeque<Instant>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// `max_requests` below 1 is treated as 1.
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::from_config(RateLimitConfig { max_requests, window })
    }

    #[must_use]
    pub fn from_config(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig { max_requests: config.max_requests.max(1), ..config };
        Self { admitted: Arc::new(Mutex::new(VecDeque::with_capacity(config.max_requests))), config }
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Suspend until fewer than `max_requests` admissions remain in the
    /// trailing window, then record this one. Returns how long the caller slept.
    pub async fn wait_for_availability(&self) -> Duration {
        let mut admitted = self.admitted.lock().await;
        let cfg = self.config;

        let now = Instant::now();
        prune_window(&mut admitted, now, cfg.window);

        let mut waited = Duration::ZERO;
        if admitted.len() >= cfg.max_requests {
            // The admission that has to expire for a slot to open.
            let blocking = admitted[admitted.len() - cfg.max_requests];
            waited = (blocking + cfg.window).saturating_duration_since(now);
            debug!(wait_ms = waited.as_millis(), in_window = admitted.len(), "rate limiter: window saturated");
            tokio::time::sleep(waited).await;
            prune_window(&mut admitted, Instant::now(), cfg.window);
        }

        admitted.push_back(Instant::now());
        waited
    }

    /// Admissions still inside the trailing window.
    pub async fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        prune_window(&mut admitted, Instant::now(), self.config.window);
        admitted.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(RateLimitConfig::default())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Drop admissions at least `window` old.
fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) >= window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
