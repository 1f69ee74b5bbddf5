//! Financial content detector: decides when a hovered element earns a tooltip.
//!
//! DESIGN
//! ======
//! The content script reports the hovered element as an `ElementSnapshot`
//! (tag + text). Detection is two independent passes over the trimmed text:
//! 1. Signal pass: first price match, first percentage match, and every
//!    listed financial term (case-insensitive substring).
//! 2. Sentiment pass: bullish keywords win over bearish ones; no match is
//!    Neutral.
//!
//! The hover lifecycle (`HoverTracker`) is a small state machine driven by
//! explicit timestamps so the 300ms debounce is deterministic:
//! `Idle → Evaluating → Visible → Idle`, or `Evaluating → Idle` on no match.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Delay between `mouseover` and evaluation.
pub const HOVER_DEBOUNCE: Duration = Duration::from_millis(300);

/// Distance between the pointer and the tooltip corner, in CSS pixels.
pub const TOOLTIP_OFFSET: f64 = 15.0;

pub const DEFAULT_INCLUDE_TAGS: &[&str] = &["P", "A", "LI", "H1", "H2", "H3", "H4", "H5", "H6", "SPAN", "DIV"];

pub const FINANCIAL_TERMS: &[&str] = &[
    "stock",
    "price",
    "market",
    "trade",
    "buy",
    "sell",
    "bull",
    "bear",
    "dividend",
    "yield",
    "investment",
    "portfolio",
    "equity",
    "fund",
    "asset",
    "bond",
    "crypto",
    "bitcoin",
    "ethereum",
    "forex",
];

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$\d+\.?\d*|\d+\.?\d*\s*(?:USD|EUR|GBP|JPY|INR)").expect("price pattern is valid")
    })
}

fn percentage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+\.?\d*\s*%").expect("percentage pattern is valid"))
}

fn bullish_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)increase|higher|gain|up|positive|bull").expect("bullish pattern is valid"))
}

fn bearish_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)decrease|lower|loss|down|negative|bear").expect("bearish pattern is valid"))
}

// =============================================================================
// TYPES
// =============================================================================

/// The hovered element as reported by the content script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    pub text: String,
}

impl ElementSnapshot {
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self { tag: tag.into(), text: text.into() }
    }
}

/// Which elements may show a tooltip. Read-only to the detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipConfig {
    /// Uppercase tag names.
    pub include_tags: BTreeSet<String>,
    pub show_text: bool,
}

impl Default for TooltipConfig {
    fn default() -> Self {
        Self {
            include_tags: DEFAULT_INCLUDE_TAGS
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
            show_text: true,
        }
    }
}

/// Tooltip settings as persisted; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTooltipConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_text: Option<bool>,
}

impl TooltipConfig {
    /// Overlay stored settings on the defaults. Absent keys keep the default.
    #[must_use]
    pub fn merged(stored: &StoredTooltipConfig) -> Self {
        let mut config = Self::default();
        if let Some(tags) = &stored.include_tags {
            config.include_tags = tags
                .iter()
                .map(|t| t.trim().to_ascii_uppercase())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(show_text) = stored.show_text {
            config.show_text = show_text;
        }
        config
    }

    #[must_use]
    pub fn includes(&self, tag: &str) -> bool {
        self.include_tags.contains(&tag.to_ascii_uppercase())
    }
}

/// Parse the options-page tag list: uppercase, comma separated, blanks dropped.
#[must_use]
pub fn parse_include_tags(raw: &str) -> Vec<String> {
    raw.to_ascii_uppercase()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Positive => "#4caf50",
            Self::Negative => "#f44336",
            Self::Neutral => "#9e9e9e",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    pub metrics: Vec<String>,
    pub terms: Vec<String>,
    pub sentiment: Sentiment,
    pub suggestion: Option<String>,
}

// =============================================================================
// DETECTION
// =============================================================================

/// True when the element's tag is included and its text carries a price,
/// a percentage, or a financial term.
#[must_use]
pub fn should_show_tooltip(config: &TooltipConfig, element: &ElementSnapshot) -> bool {
    if !config.includes(&element.tag) {
        return false;
    }
    let text = element.text.trim();
    price_re().is_match(text) || percentage_re().is_match(text) || !matched_terms(text).is_empty()
}

/// Extract metrics, terms, sentiment, and a suggestion from the element text.
/// Returns `None` when neither a metric nor a term was found.
#[must_use]
pub fn analyze_financial_content(element: &ElementSnapshot) -> Option<FinancialAnalysis> {
    let text = element.text.trim();

    let mut metrics = Vec::new();
    if let Some(price) = price_re().find(text) {
        metrics.push(format!("Price: {}", price.as_str()));
    }
    if let Some(change) = percentage_re().find(text) {
        metrics.push(format!("Change: {}", change.as_str()));
    }

    let terms: Vec<String> = matched_terms(text)
        .into_iter()
        .map(str::to_owned)
        .collect();

    if metrics.is_empty() && terms.is_empty() {
        return None;
    }

    let suggestion = (!terms.is_empty()).then(|| suggestion_for(&terms).to_string());
    Some(FinancialAnalysis { metrics, terms, sentiment: sentiment_of(text), suggestion })
}

fn matched_terms(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    FINANCIAL_TERMS
        .iter()
        .copied()
        .filter(|term| lower.contains(term))
        .collect()
}

fn sentiment_of(text: &str) -> Sentiment {
    if bullish_re().is_match(text) {
        Sentiment::Positive
    } else if bearish_re().is_match(text) {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Highest-priority rule wins: stock, then crypto, then dividend.
fn suggestion_for(terms: &[String]) -> &'static str {
    let has = |needle: &str| terms.iter().any(|t| t == needle);
    if has("stock") {
        "Consider checking company fundamentals and market trends"
    } else if has("crypto") {
        "High volatility asset - ensure proper risk management"
    } else if has("dividend") {
        "Review dividend history and payout ratio"
    } else {
        "Click for detailed financial analysis"
    }
}

// =============================================================================
// TOOLTIP RENDERING
// =============================================================================

/// Build the tooltip body for an analysis.
#[must_use]
pub fn tooltip_html(analysis: &FinancialAnalysis) -> String {
    let mut sections = Vec::with_capacity(4);
    if !analysis.metrics.is_empty() {
        sections.push(format!("<div class=\"metrics\">{}</div>", analysis.metrics.join(" | ")));
    }
    if !analysis.terms.is_empty() {
        sections.push(format!("<div class=\"terms\">Related: {}</div>", analysis.terms.join(", ")));
    }
    let mut sentiment = String::new();
    let _ = write!(
        sentiment,
        "<div class=\"sentiment\" style=\"color: {}\">Sentiment: {}</div>",
        analysis.sentiment.color(),
        analysis.sentiment
    );
    sections.push(sentiment);
    if let Some(suggestion) = &analysis.suggestion {
        sections.push(format!("<div class=\"suggestion\">{suggestion}</div>"));
    }
    sections.join("<br>")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Place the tooltip below-right of the pointer, flipping left/up when it
/// would overflow the viewport. Never returns negative coordinates.
#[must_use]
pub fn position_tooltip(pointer: Point, tooltip: Size, viewport: Size) -> Point {
    let mut x = pointer.x + TOOLTIP_OFFSET;
    let mut y = pointer.y + TOOLTIP_OFFSET;
    if x + tooltip.width > viewport.width {
        x = pointer.x - tooltip.width - TOOLTIP_OFFSET;
    }
    if y + tooltip.height > viewport.height {
        y = pointer.y - tooltip.height - TOOLTIP_OFFSET;
    }
    Point { x: x.max(0.0), y: y.max(0.0) }
}

// =============================================================================
// HOVER LIFECYCLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverPhase {
    Idle,
    Evaluating,
    Visible,
}

#[derive(Debug)]
enum HoverState {
    Idle,
    Evaluating { element: ElementSnapshot, due: Instant },
    Visible(FinancialAnalysis),
}

/// Debounced hover state machine for one tooltip.
#[derive(Debug)]
pub struct HoverTracker {
    state: HoverState,
    debounce: Duration,
}

impl HoverTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_debounce(HOVER_DEBOUNCE)
    }

    #[must_use]
    pub fn with_debounce(debounce: Duration) -> Self {
        Self { state: HoverState::Idle, debounce }
    }

    #[must_use]
    pub fn phase(&self) -> HoverPhase {
        match self.state {
            HoverState::Idle => HoverPhase::Idle,
            HoverState::Evaluating { .. } => HoverPhase::Evaluating,
            HoverState::Visible(_) => HoverPhase::Visible,
        }
    }

    /// Start (or restart) the debounce for a newly hovered element. Any
    /// visible tooltip is hidden until the new element is evaluated.
    pub fn mouse_over(&mut self, element: ElementSnapshot, now: Instant) {
        self.state = HoverState::Evaluating { element, due: now + self.debounce };
    }

    /// Cancel any pending evaluation and hide the tooltip.
    pub fn mouse_out(&mut self) {
        self.state = HoverState::Idle;
    }

    /// Advance the clock. Returns the analysis to display once the debounce
    /// has elapsed and the element matched; leaves the tracker Idle otherwise.
    pub fn tick(&mut self, now: Instant, config: &TooltipConfig) -> Option<&FinancialAnalysis> {
        if let HoverState::Evaluating { element, due } = &self.state {
            if now < *due {
                return None;
            }
            let analysis = should_show_tooltip(config, element)
                .then(|| analyze_financial_content(element))
                .flatten();
            self.state = match analysis {
                Some(analysis) => HoverState::Visible(analysis),
                None => HoverState::Idle,
            };
        }
        match &self.state {
            HoverState::Visible(analysis) => Some(analysis),
            _ => None,
        }
    }
}

impl Default for HoverTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "detector_test.rs"]
mod tests;
