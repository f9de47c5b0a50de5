//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Decode HTML entities and collapse whitespace
///
/// Listing titles and summaries come back with `&quot;`-style entities and
/// stray line breaks.
pub fn clean_text(text: &str) -> String {
    normalize_whitespace(&html_escape::decode_html_entities(text))
}

/// Extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url).context("Invalid URL")?;

    parsed
        .host_str()
        .map(|s| s.to_string())
        .context("No host in URL")
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
