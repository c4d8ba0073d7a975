//! Free-text columns and the HTML clean-up shared with alert parsing.

use super::Normalized;
use crate::utils::{collapse_whitespace, truncate_chars};
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("valid regex"));

/// Drop tags and decode the handful of entities alert snippets use.
pub fn strip_html(s: &str) -> String {
    let without_tags = TAG_RE.replace_all(s, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    collapse_whitespace(&decoded)
}

pub fn normalize_text(raw: &str, max_chars: usize) -> Normalized {
    let stripped = strip_html(raw);
    let cleaned = collapse_whitespace(&URL_RE.replace_all(&stripped, " "));
    if cleaned.is_empty() {
        return Normalized::null();
    }
    if cleaned.chars().count() > max_chars {
        return Normalized::value(truncate_chars(&cleaned, max_chars)).with_note("truncated");
    }
    Normalized::value(cleaned)
}
