//! Markdown renderer: model output to HTML fragments.
//!
//! DESIGN
//! ======
//! Covers the subset the completion endpoint actually produces: `#` to `###`
//! headers, `**bold**`, `*italic*`, `- ` and `N. ` list items, and line
//! breaks. Consecutive items of the same kind share one `<ul>`/`<ol>`.
//! Header and list lines absorb their own newline; every other newline
//! becomes `<br>`.
//!
//! TRADE-OFFS
//! ==========
//! `render` trusts its input and performs no escaping, matching what the
//! panels have always displayed. Hosts that do not trust the model use
//! `render_escaped`, which neutralises raw HTML before the substitutions run.

use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"))
}

fn italic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*(.+?)\*").expect("italic pattern is valid"))
}

fn ordered_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\. (.*)$").expect("ordered item pattern is valid"))
}

// =============================================================================
// LINE CLASSIFICATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn open_tag(self) -> &'static str {
        match self {
            Self::Unordered => "<ul>",
            Self::Ordered => "<ol>",
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            Self::Unordered => "</ul>",
            Self::Ordered => "</ol>",
        }
    }
}

enum Line<'a> {
    Header(u8, &'a str),
    Item(ListKind, &'a str),
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim_start();
    if let Some(body) = trimmed.strip_prefix("### ") {
        return Line::Header(3, body);
    }
    if let Some(body) = trimmed.strip_prefix("## ") {
        return Line::Header(2, body);
    }
    if let Some(body) = trimmed.strip_prefix("# ") {
        return Line::Header(1, body);
    }
    if let Some(body) = trimmed.strip_prefix("- ") {
        return Line::Item(ListKind::Unordered, body);
    }
    if let Some(body) = ordered_item_re()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
    {
        return Line::Item(ListKind::Ordered, body.as_str());
    }
    Line::Text(line)
}

// =============================================================================
// RENDERING
// =============================================================================

/// Render trusted markdown to an HTML fragment.
#[must_use]
pub fn render(markdown: &str) -> String {
    let mut html = String::with_capacity(markdown.len() + 32);
    let mut open: Option<ListKind> = None;

    for segment in markdown.split_inclusive('\n') {
        let (line, newline) = match segment.strip_suffix('\n') {
            Some(line) => (line.strip_suffix('\r').unwrap_or(line), true),
            None => (segment, false),
        };

        match classify(line) {
            Line::Header(level, body) => {
                close_list(&mut html, &mut open);
                let _ = write!(html, "<h{level}>{}</h{level}>", inline(body));
            }
            Line::Item(kind, body) => {
                if open != Some(kind) {
                    close_list(&mut html, &mut open);
                    html.push_str(kind.open_tag());
                    open = Some(kind);
                }
                let _ = write!(html, "<li>{}</li>", inline(body));
            }
            Line::Text(body) => {
                close_list(&mut html, &mut open);
                html.push_str(&inline(body));
                if newline {
                    html.push_str("<br>");
                }
            }
        }
    }

    close_list(&mut html, &mut open);
    html
}

/// Escape raw HTML in `markdown`, then render it.
#[must_use]
pub fn render_escaped(markdown: &str) -> String {
    render(&escape_html(markdown))
}

/// Escape the characters that let text break out of an HTML text node.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn inline(text: &str) -> String {
    let bolded = bold_re().replace_all(text, "<strong>$1</strong>");
    italic_re()
        .replace_all(&bolded, "<em>$1</em>")
        .into_owned()
}

fn close_list(html: &mut String, open: &mut Option<ListKind>) {
    if let Some(kind) = open.take() {
        html.push_str(kind.close_tag());
    }
}

#[cfg(test)]
#[path = "markdown_test.rs"]
mod tests;
