//! Page context: turns a captured page into a financial snapshot.
//!
//! DESIGN
//! ======
//! The content script posts a `PageDocument` (visible text plus a flat list of
//! elements) whenever the user grabs a page. `ActiveTab` keeps the latest one,
//! and `extract_snapshot` derives the `PageSnapshot` that seeds the first turn
//! of a side-panel conversation.
//!
//! Capture goes through the `PageContextSource` trait so sessions can be
//! tested without a page.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ErrorCode;

/// Terms looked for in page text, in reporting order.
pub const PAGE_TERMS: [&str; 10] =
    ["stock", "price", "market", "trade", "buy", "sell", "bull", "bear", "dividend", "yield"];

/// How many numbers the grab summary shows.
pub const SUMMARY_NUMBER_LIMIT: usize = 10;

const ANALYSIS_REQUESTED: &str = "ANALYSIS REQUESTED:
Please analyze this financial information considering:
1. Market context and trends
2. Key metrics and indicators
3. Potential risks and opportunities
4. Technical analysis points if applicable
5. Related market factors
";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentExtractionError {
    #[error("no active tab found")]
    NoActiveTab,
}

impl ErrorCode for ContentExtractionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoActiveTab => "E_NO_ACTIVE_TAB",
        }
    }
}

// =============================================================================
// PAGE DOCUMENT
// =============================================================================

/// One element of a captured page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageElement {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
}

impl PageElement {
    fn is_price_marker(&self) -> bool {
        self.attributes.contains_key("data-symbol") || self.classes.iter().any(|c| c == "price" || c == "quote")
    }

    fn is_table(&self) -> bool {
        self.tag.eq_ignore_ascii_case("table")
    }
}

/// A page as reported by the content script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDocument {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Visible text of the page body.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub elements: Vec<PageElement>,
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Financial data extracted from one page capture. Never mutated once built;
/// a re-grab replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub raw_text: String,
    pub extracted_numbers: Vec<String>,
    pub matched_terms: Vec<String>,
    pub price_elements: Vec<String>,
    pub table_text: Vec<String>,
}

/// What the side panel shows after a grab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub url: String,
    pub title: String,
    pub terms: Vec<String>,
    pub numbers: Vec<String>,
}

impl From<&PageSnapshot> for SnapshotSummary {
    fn from(snapshot: &PageSnapshot) -> Self {
        Self {
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            terms: snapshot.matched_terms.clone(),
            numbers: snapshot.extracted_numbers.iter().take(SUMMARY_NUMBER_LIMIT).cloned().collect(),
        }
    }
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d,]+\.?\d*").expect("number pattern is valid"))
}

/// Every decimal-with-commas substring that contains at least one digit.
#[must_use]
pub fn extract_numbers(text: &str) -> Vec<String> {
    number_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|s| s.bytes().any(|b| b.is_ascii_digit()))
        .map(str::to_owned)
        .collect()
}

/// `PAGE_TERMS` present anywhere in `text`, case-insensitively.
#[must_use]
pub fn find_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    PAGE_TERMS
        .iter()
        .filter(|term| lower.contains(*term))
        .map(|term| (*term).to_string())
        .collect()
}

#[must_use]
pub fn extract_snapshot(page: &PageDocument) -> PageSnapshot {
    let snapshot = PageSnapshot {
        url: page.url.clone(),
        title: page.title.clone(),
        raw_text: page.text.clone(),
        extracted_numbers: extract_numbers(&page.text),
        matched_terms: find_terms(&page.text),
        price_elements: page
            .elements
            .iter()
            .filter(|e| e.is_price_marker())
            .map(|e| e.text.trim().to_string())
            .collect(),
        table_text: page
            .elements
            .iter()
            .filter(|e| e.is_table())
            .map(|e| e.text.trim().to_string())
            .collect(),
    };
    debug!(
        url = %snapshot.url,
        numbers = snapshot.extracted_numbers.len(),
        terms = snapshot.matched_terms.len(),
        prices = snapshot.price_elements.len(),
        tables = snapshot.table_text.len(),
        "context: snapshot extracted"
    );
    snapshot
}

/// The block prepended to the first side-panel question.
#[must_use]
pub fn format_financial_context(snapshot: &PageSnapshot) -> String {
    let body = serde_json::to_string_pretty(snapshot).unwrap_or_default();
    format!("\nFINANCIAL CONTEXT:\n----------------\n{body}\n\n{ANALYSIS_REQUESTED}")
}

// =============================================================================
// SOURCE
// =============================================================================

/// Supplies the snapshot for the page the user is looking at.
#[async_trait::async_trait]
pub trait PageContextSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ContentExtractionError::NoActiveTab`] when no page is available.
    async fn capture(&self) -> Result<PageSnapshot, ContentExtractionError>;
}

/// The most recently reported page.
#[derive(Clone, Default)]
pub struct ActiveTab {
    page: Arc<RwLock<Option<PageDocument>>>,
}

impl ActiveTab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn report(&self, page: PageDocument) {
        info!(url = %page.url, elements = page.elements.len(), "context: active page reported");
        *self.page.write().await = Some(page);
    }

    pub async fn clear(&self) {
        *self.page.write().await = None;
    }
}

#[async_trait::async_trait]
impl PageContextSource for ActiveTab {
    async fn capture(&self) -> Result<PageSnapshot, ContentExtractionError> {
        let page = self.page.read().await;
        page.as_ref().map(extract_snapshot).ok_or(ContentExtractionError::NoActiveTab)
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
