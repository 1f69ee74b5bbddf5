use std::sync::Mutex;

use tokio::time::Instant;

use super::*;

fn rate_limited() -> CompletionError {
    CompletionError::upstream(429, "rate limit exceeded")
}

#[test]
fn backoff_is_linear_for_rate_limits() {
    assert_eq!(rate_limit_backoff(&rate_limited(), 1), Some(Duration::from_millis(2000)));
    assert_eq!(rate_limit_backoff(&rate_limited(), 2), Some(Duration::from_millis(4000)));
    assert_eq!(rate_limit_backoff(&CompletionError::Transport("reset".into()), 1), None);
}

#[test]
fn zero_attempts_clamped_to_one() {
    assert_eq!(RetryPolicy::completion(0).max_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_success() {
    let start = Instant::now();
    let attempts = Mutex::new(Vec::new());

    let result = retry_with_policy(&RetryPolicy::completion(3), |attempt| {
        attempts.lock().unwrap().push(start.elapsed());
        async move { if attempt < 3 { Err(rate_limited()) } else { Ok("answer") } }
    })
    .await;

    assert_eq!(result.unwrap(), "answer");
    let attempts = attempts.into_inner().unwrap();
    assert_eq!(
        attempts,
        vec![Duration::ZERO, Duration::from_millis(2000), Duration::from_millis(6000)]
    );
}

#[tokio::test(start_paused = true)]
async fn other_errors_retry_immediately() {
    let start = Instant::now();
    let mut calls = 0;

    let result: Result<(), CompletionError> = retry_with_policy(&RetryPolicy::completion(3), |_| {
        calls += 1;
        async { Err(CompletionError::Transport("connection reset".into())) }
    })
    .await;

    assert!(matches!(result, Err(CompletionError::Transport(_))));
    assert_eq!(calls, 3);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn final_error_is_returned_unchanged() {
    let result: Result<(), CompletionError> = retry_with_policy(&RetryPolicy::completion(2), |attempt| async move {
        Err(CompletionError::upstream(400, format!("failure {attempt}")))
    })
    .await;

    assert_eq!(result.unwrap_err(), CompletionError::Upstream { status: 400, message: "failure 2".into() });
}

#[tokio::test(start_paused = true)]
async fn no_sleep_after_last_attempt() {
    let start = Instant::now();

    let result: Result<(), CompletionError> =
        retry_with_policy(&RetryPolicy::completion(1), |_| async { Err(rate_limited()) }).await;

    assert!(result.unwrap_err().is_rate_limited());
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn custom_backoff_fn() {
    fn never(_: &String, _: usize) -> Option<Duration> {
        None
    }
    let policy = RetryPolicy::new(4, never);
    let mut seen = Vec::new();

    let result: Result<u8, String> = retry_with_policy(&policy, |attempt| {
        seen.push(attempt);
        async move { if attempt == 4 { Ok(9) } else { Err(format!("attempt {attempt}")) } }
    })
    .await;

    assert_eq!(result, Ok(9));
    assert_eq!(seen, vec![1, 2, 3, 4]);
}
