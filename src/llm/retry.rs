//! Retry policy and the single combinator that applies it.
//!
//! DESIGN
//! ======
//! A `RetryPolicy` is a maximum attempt count plus a backoff function keyed
//! by the error and the 1-based index of the attempt that just failed.
//! `Some(delay)` sleeps before the next attempt, `None` retries at once. The
//! last attempt's error is returned unchanged.
//!
//! Quick Ask and sidebar chat both go through `retry_with_policy`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::types::CompletionError;

/// Linear step for rate-limit backoff: attempt `i` waits `i × 2000ms`.
pub const RATE_LIMIT_BACKOFF_STEP: Duration = Duration::from_millis(2000);

pub type BackoffFn<E> = fn(&E, usize) -> Option<Duration>;

#[derive(Clone, Copy)]
pub struct RetryPolicy<E> {
    max_attempts: usize,
    backoff: BackoffFn<E>,
}

impl<E> RetryPolicy<E> {
    /// `max_attempts` below 1 is treated as 1.
    #[must_use]
    pub fn new(max_attempts: usize, backoff: BackoffFn<E>) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay to wait after `attempt` failed with `err`.
    pub fn backoff(&self, err: &E, attempt: usize) -> Option<Duration> {
        (self.backoff)(err, attempt)
    }
}

impl RetryPolicy<CompletionError> {
    /// Completion policy: back off linearly on rate limiting, retry
    /// everything else immediately.
    #[must_use]
    pub fn completion(max_attempts: usize) -> Self {
        Self::new(max_attempts, rate_limit_backoff)
    }
}

#[must_use]
pub fn rate_limit_backoff(err: &CompletionError, attempt: usize) -> Option<Duration> {
    if !err.is_rate_limited() {
        return None;
    }
    let step = u32::try_from(attempt).unwrap_or(u32::MAX);
    Some(RATE_LIMIT_BACKOFF_STEP.saturating_mul(step))
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
/// `op` receives the 1-based attempt index.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn retry_with_policy<T, E, F, Fut>(policy: &RetryPolicy<E>, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts => {
                warn!(attempt, error = %e, "retry: attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                warn!(attempt, error = %e, "retry: attempt failed");
                if let Some(delay) = policy.backoff(&e, attempt) {
                    info!(attempt, delay_ms = delay.as_millis(), "retry: backing off");
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
