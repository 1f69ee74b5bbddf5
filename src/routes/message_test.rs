use std::time::Duration;

use super::*;
use crate::detector::TooltipConfig;
use crate::router::EVENT_CHANNEL_CAPACITY;

fn state() -> AppState {
    AppState::new(None, &TooltipConfig::default(), false)
}

#[tokio::test]
async fn post_message_dispatches_action() {
    let state = state();

    let Json(response) = post_message(State(state), Json(Action::GetTooltipConfig)).await;

    assert_eq!(response.success, Some(true));
    assert_eq!(response.tooltip_config, Some(TooltipConfig::default()));
}

#[tokio::test]
async fn post_message_reports_missing_llm() {
    let state = state();
    let action = Action::Chat { prompt: "q".into(), context: String::new() };

    let Json(response) = post_message(State(state), Json(action)).await;

    assert_eq!(response.code.as_deref(), Some("E_LLM_NOT_CONFIGURED"));
}

#[tokio::test]
async fn selections_are_polled_once() {
    let state = state();
    post_message(State(state.clone()), Json(Action::AnalyzeText { text: "one".into() })).await;
    post_message(State(state.clone()), Json(Action::AnalyzeText { text: "two".into() })).await;

    let Json(events) = poll_events(State(state.clone())).await;
    assert_eq!(
        events,
        vec![Event::TextSelected { text: "one".into() }, Event::TextSelected { text: "two".into() }]
    );

    let Json(events) = poll_events(State(state)).await;
    assert!(events.is_empty());
}

#[tokio::test]
async fn seeded_tooltip_config_is_served() {
    let mut tooltip = TooltipConfig::default();
    tooltip.include_tags = ["TD".to_string()].into_iter().collect();
    let state = AppState::new(None, &tooltip, false);

    let Json(response) = post_message(State(state), Json(Action::GetTooltipConfig)).await;

    assert_eq!(response.tooltip_config, Some(tooltip));
}

#[tokio::test(start_paused = true)]
async fn unpolled_selections_fail_fast_once_queue_fills() {
    let state = state();
    for i in 0..EVENT_CHANNEL_CAPACITY {
        let action = Action::AnalyzeText { text: format!("selection {i}") };
        let Json(response) = post_message(State(state.clone()), Json(action)).await;
        assert_eq!(response.success, Some(true));
    }

    let overflow = Action::AnalyzeText { text: "one too many".into() };
    let Json(response) =
        tokio::time::timeout(Duration::from_secs(2), post_message(State(state.clone()), Json(overflow)))
            .await
            .expect("analyzeText returns once the queue is full");

    assert_eq!(response.success, Some(false));
    assert_eq!(response.code.as_deref(), Some("E_QUEUE_FULL"));

    let Json(events) = poll_events(State(state.clone())).await;
    assert_eq!(events.len(), EVENT_CHANNEL_CAPACITY);
    let Json(response) =
        post_message(State(state), Json(Action::AnalyzeText { text: "after poll".into() })).await;
    assert_eq!(response.success, Some(true));
}
