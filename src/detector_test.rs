use super::*;

fn p(text: &str) -> ElementSnapshot {
    ElementSnapshot::new("P", text)
}

// =========================================================================
// should_show_tooltip
// =========================================================================

#[test]
fn shows_for_price_percentage_or_term() {
    let config = TooltipConfig::default();
    assert!(should_show_tooltip(&config, &p("Now $42.10")));
    assert!(should_show_tooltip(&config, &p("Closed at 120 EUR")));
    assert!(should_show_tooltip(&config, &p("down -2.4 %")));
    assert!(should_show_tooltip(&config, &p("Our Portfolio review")));
}

#[test]
fn hides_for_plain_text() {
    let config = TooltipConfig::default();
    assert!(!should_show_tooltip(&config, &p("The sky is blue")));
}

#[test]
fn hides_when_tag_not_included() {
    let config = TooltipConfig::default();
    assert!(!should_show_tooltip(&config, &ElementSnapshot::new("BUTTON", "Buy $10")));
}

#[test]
fn tag_match_is_case_insensitive() {
    let config = TooltipConfig::default();
    assert!(should_show_tooltip(&config, &ElementSnapshot::new("span", "bond yields")));
}

// =========================================================================
// analyze_financial_content
// =========================================================================

#[test]
fn analysis_of_price_move() {
    let analysis = analyze_financial_content(&p("AAPL is up 3.5% to $150.20")).unwrap();
    assert_eq!(analysis.metrics, vec!["Price: $150.20".to_string(), "Change: 3.5%".to_string()]);
    assert_eq!(analysis.sentiment, Sentiment::Positive);
    assert!(analysis.terms.is_empty());
    assert!(analysis.suggestion.is_none());
}

#[test]
fn analysis_none_without_signal() {
    assert!(analyze_financial_content(&p("The sky is blue")).is_none());
}

#[test]
fn analysis_collects_terms_in_list_order() {
    let analysis = analyze_financial_content(&p("Crypto and stock markets")).unwrap();
    assert_eq!(analysis.terms, vec!["stock", "market", "crypto"]);
    assert_eq!(
        analysis.suggestion.as_deref(),
        Some("Consider checking company fundamentals and market trends")
    );
}

#[test]
fn suggestion_priority_crypto_over_dividend() {
    let analysis = analyze_financial_content(&p("crypto dividend")).unwrap();
    assert_eq!(analysis.suggestion.as_deref(), Some("High volatility asset - ensure proper risk management"));

    let analysis = analyze_financial_content(&p("dividend policy")).unwrap();
    assert_eq!(analysis.suggestion.as_deref(), Some("Review dividend history and payout ratio"));

    let analysis = analyze_financial_content(&p("forex desk")).unwrap();
    assert_eq!(analysis.suggestion.as_deref(), Some("Click for detailed financial analysis"));
}

#[test]
fn sentiment_negative_and_neutral() {
    let analysis = analyze_financial_content(&p("Shares fell, a loss of 4%")).unwrap();
    assert_eq!(analysis.sentiment, Sentiment::Negative);

    let analysis = analyze_financial_content(&p("Trading at $12")).unwrap();
    assert_eq!(analysis.sentiment, Sentiment::Neutral);
}

#[test]
fn bullish_keywords_win_over_bearish() {
    let analysis = analyze_financial_content(&p("bear market turned into a gain")).unwrap();
    assert_eq!(analysis.sentiment, Sentiment::Positive);
}

// =========================================================================
// tooltip rendering and placement
// =========================================================================

#[test]
fn tooltip_html_sections() {
    let analysis = analyze_financial_content(&p("stock up 2% at $10")).unwrap();
    let html = tooltip_html(&analysis);
    assert!(html.starts_with("<div class=\"metrics\">Price: $10 | Change: 2%</div>"));
    assert!(html.contains("Related: stock"));
    assert!(html.contains("color: #4caf50\">Sentiment: Positive"));
    assert!(html.ends_with("market trends</div>"));
}

#[test]
fn tooltip_placed_below_right_when_room() {
    let pos = position_tooltip(
        Point { x: 100.0, y: 100.0 },
        Size { width: 200.0, height: 80.0 },
        Size { width: 1024.0, height: 768.0 },
    );
    assert_eq!(pos, Point { x: 115.0, y: 115.0 });
}

#[test]
fn tooltip_flips_near_edges() {
    let pos = position_tooltip(
        Point { x: 1000.0, y: 750.0 },
        Size { width: 200.0, height: 80.0 },
        Size { width: 1024.0, height: 768.0 },
    );
    assert_eq!(pos, Point { x: 785.0, y: 655.0 });
}

#[test]
fn tooltip_never_negative() {
    let pos = position_tooltip(
        Point { x: 10.0, y: 10.0 },
        Size { width: 300.0, height: 300.0 },
        Size { width: 200.0, height: 200.0 },
    );
    assert_eq!(pos, Point { x: 0.0, y: 0.0 });
}

// =========================================================================
// TooltipConfig
// =========================================================================

#[test]
fn merged_config_keeps_defaults_for_absent_keys() {
    let stored = StoredTooltipConfig { include_tags: None, show_text: Some(false) };
    let config = TooltipConfig::merged(&stored);
    assert!(config.includes("DIV"));
    assert!(!config.show_text);
}

#[test]
fn merged_config_replaces_tags() {
    let stored = StoredTooltipConfig { include_tags: Some(vec!["td".into(), " th ".into()]), show_text: None };
    let config = TooltipConfig::merged(&stored);
    assert_eq!(config.include_tags.len(), 2);
    assert!(config.includes("TD"));
    assert!(!config.includes("P"));
}

#[test]
fn parse_include_tags_normalises() {
    assert_eq!(parse_include_tags("p, td,,  span "), vec!["P", "TD", "SPAN"]);
    assert!(parse_include_tags("  ").is_empty());
}

#[test]
fn tooltip_config_serde_uses_camel_case() {
    let json = serde_json::to_value(TooltipConfig::default()).unwrap();
    assert!(json.get("includeTags").is_some());
    assert_eq!(json.get("showText"), Some(&serde_json::json!(true)));
}

// =========================================================================
// HoverTracker
// =========================================================================

#[test]
fn hover_shows_after_debounce() {
    let config = TooltipConfig::default();
    let mut tracker = HoverTracker::new();
    let t0 = Instant::now();

    tracker.mouse_over(p("stock at $5"), t0);
    assert_eq!(tracker.phase(), HoverPhase::Evaluating);
    assert!(tracker.tick(t0 + Duration::from_millis(299), &config).is_none());
    assert_eq!(tracker.phase(), HoverPhase::Evaluating);

    let shown = tracker.tick(t0 + HOVER_DEBOUNCE, &config);
    assert!(shown.is_some());
    assert_eq!(tracker.phase(), HoverPhase::Visible);

    tracker.mouse_out();
    assert_eq!(tracker.phase(), HoverPhase::Idle);
}

#[test]
fn hover_without_match_returns_to_idle() {
    let config = TooltipConfig::default();
    let mut tracker = HoverTracker::new();
    let t0 = Instant::now();

    tracker.mouse_over(p("nothing here"), t0);
    assert!(tracker.tick(t0 + HOVER_DEBOUNCE, &config).is_none());
    assert_eq!(tracker.phase(), HoverPhase::Idle);
}

#[test]
fn new_mouseover_restarts_debounce() {
    let config = TooltipConfig::default();
    let mut tracker = HoverTracker::new();
    let t0 = Instant::now();

    tracker.mouse_over(p("bond"), t0);
    tracker.mouse_over(p("equity"), t0 + Duration::from_millis(200));
    assert!(tracker.tick(t0 + Duration::from_millis(400), &config).is_none());
    let shown = tracker
        .tick(t0 + Duration::from_millis(500), &config)
        .unwrap();
    assert_eq!(shown.terms, vec!["equity"]);
}

#[test]
fn mouse_out_cancels_pending_evaluation() {
    let config = TooltipConfig::default();
    let mut tracker = HoverTracker::new();
    let t0 = Instant::now();

    tracker.mouse_over(p("bond"), t0);
    tracker.mouse_out();
    assert!(tracker.tick(t0 + HOVER_DEBOUNCE, &config).is_none());
    assert_eq!(tracker.phase(), HoverPhase::Idle);
}
