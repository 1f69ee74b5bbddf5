use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::llm::types::Role;

// =========================================================================
// MockBackend
// =========================================================================

struct MockBackend {
    responses: Mutex<Vec<Result<String, CompletionError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    started: Instant,
    attempt_times: Mutex<Vec<Duration>>,
}

impl MockBackend {
    fn new(responses: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            started: Instant::now(),
            attempt_times: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn attempt_times(&self) -> Vec<Duration> {
        self.attempt_times.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatCompletion for MockBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request.clone());
        self.attempt_times.lock().unwrap().push(self.started.elapsed());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() { Ok("done".into()) } else { responses.remove(0) }
    }
}

fn rate_limited() -> CompletionError {
    CompletionError::upstream(400, "Requests to the API exceeded the rate limit")
}

// =========================================================================
// Payload assembly
// =========================================================================

#[test]
fn user_content_embeds_context_and_question() {
    let request = CompletionRequest::new("Is it overvalued?").with_context("AAPL $150");
    assert_eq!(request.user_content(), "Context: AAPL $150\n\nQuestion: Is it overvalued?");
}

#[test]
fn user_content_without_context_is_bare_message() {
    assert_eq!(CompletionRequest::new("Hello").user_content(), "Hello");
    assert_eq!(CompletionRequest::new("Hello").with_context("  \n").user_content(), "Hello");
}

#[test]
fn brief_mode_payload() {
    let client = CompletionClient::new(MockBackend::new(vec![]));
    let history = vec![ConversationTurn::user("earlier"), ConversationTurn::assistant("reply")];
    let request = CompletionRequest::new("q")
        .with_mode(CompletionMode::Brief)
        .with_history(history);

    let chat = client.build_chat_request(&request);
    assert_eq!(chat.messages.len(), 2, "history is ignored in brief mode");
    assert_eq!(chat.messages[0].role, Role::System);
    assert!(chat.messages[0].content.ends_with(BRIEF_DIRECTIVE));
    assert!(!chat.messages[0].content.contains("Remember to:"), "advisory block is side-panel only");
    assert_eq!(chat.params.max_tokens, 150);
    assert!((chat.params.top_p - 0.5).abs() < f32::EPSILON);
    assert!((chat.params.presence_penalty - 0.6).abs() < f32::EPSILON);
}

#[test]
fn full_mode_payload_includes_history_in_order() {
    let client = CompletionClient::new(MockBackend::new(vec![]));
    let history = vec![ConversationTurn::user("earlier"), ConversationTurn::assistant("reply")];
    let request = CompletionRequest::new("next").with_history(history.clone());

    let chat = client.build_chat_request(&request);
    assert_eq!(chat.messages[0], ConversationTurn::system(format!("{FINANCIAL_SYSTEM_PROMPT}{ADVISORY_GUIDANCE}")));
    assert_eq!(&chat.messages[1..3], history.as_slice());
    assert_eq!(chat.messages[3], ConversationTurn::user("next"));
    assert_eq!(chat.params.max_tokens, 800);
    assert!((chat.params.top_p - 1.0).abs() < f32::EPSILON);
    assert!(chat.params.presence_penalty.abs() < f32::EPSILON);
    assert!((chat.params.temperature - 0.7).abs() < f32::EPSILON);
}

#[test]
fn full_mode_system_prompt_carries_advisory_guidance() {
    let client = CompletionClient::new(MockBackend::new(vec![]));
    let chat = client.build_chat_request(&CompletionRequest::new("q"));

    let system = &chat.messages[0].content;
    assert!(system.starts_with(FINANCIAL_SYSTEM_PROMPT));
    assert!(system.contains("\n\nRemember to:\n"));
    assert!(system.contains("- Mention that this is analysis, not financial advice"));
    assert!(system.ends_with("- Use clear, non-technical language when possible"));
}

#[test]
fn token_limits_are_configurable() {
    let client = CompletionClient::new(MockBackend::new(vec![]))
        .with_token_limits(TokenLimits { quick_ask: 60, sidebar: 1200 });
    assert_eq!(client.params_for(CompletionMode::Brief).max_tokens, 60);
    assert_eq!(client.params_for(CompletionMode::Full).max_tokens, 1200);
}

// =========================================================================
// complete
// =========================================================================

#[tokio::test]
async fn complete_returns_first_success() {
    let backend = MockBackend::new(vec![Ok("Bonds are loans.".into())]);
    let client = CompletionClient::new(backend.clone());

    let answer = client.complete(&CompletionRequest::new("What is a bond?")).await.unwrap();
    assert_eq!(answer, "Bonds are loans.");
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_success_waits_2s_then_4s() {
    let backend = MockBackend::new(vec![Err(rate_limited()), Err(rate_limited()), Ok("third time".into())]);
    let client = CompletionClient::new(backend.clone());

    let answer = client.complete(&CompletionRequest::new("q")).await.unwrap();
    assert_eq!(answer, "third time");

    let times = backend.attempt_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], Duration::from_millis(2000));
    assert_eq!(times[2] - times[1], Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_propagate_last_error() {
    let backend = MockBackend::new(vec![
        Err(CompletionError::Transport("reset".into())),
        Err(CompletionError::MalformedResponse("no choices".into())),
    ]);
    let client = CompletionClient::new(backend.clone());

    let err = client
        .complete(&CompletionRequest::new("q").with_max_retries(2))
        .await
        .unwrap_err();
    assert_eq!(err, CompletionError::MalformedResponse("no choices".into()));
    assert_eq!(backend.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn client_default_max_retries_applies() {
    let backend = MockBackend::new(vec![
        Err(CompletionError::Transport("a".into())),
        Err(CompletionError::Transport("b".into())),
        Err(CompletionError::Transport("c".into())),
        Err(CompletionError::Transport("d".into())),
    ]);
    let client = CompletionClient::new(backend.clone()).with_max_retries(4);

    let err = client.complete(&CompletionRequest::new("q")).await.unwrap_err();
    assert_eq!(err, CompletionError::Transport("d".into()));
    assert_eq!(backend.requests().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn limiter_gates_every_attempt() {
    let backend = MockBackend::new(vec![
        Err(CompletionError::Transport("a".into())),
        Err(CompletionError::Transport("b".into())),
        Ok("ok".into()),
    ]);
    let limiter = RateLimiter::new(1, Duration::from_millis(1000));
    let client = CompletionClient::new(backend.clone()).with_rate_limiter(limiter);

    client.complete(&CompletionRequest::new("q")).await.unwrap();

    let times = backend.attempt_times();
    assert_eq!(times, vec![Duration::ZERO, Duration::from_millis(1000), Duration::from_millis(2000)]);
}
