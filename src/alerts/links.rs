//! Link clean-up and extraction from alert HTML.

use crate::models::AlertLink;
use crate::utils::{collapse_whitespace, truncate_chars};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Query keys that only carry tracking state.
const TRACKING_KEYS: [&str; 3] = ["ved", "usg", "ei"];

/// `https://www.google.com/url?...&url=<target>` (or `q=`) to `<target>`.
pub fn unwrap_google_redirect(href: &str) -> String {
    let Ok(parsed) = Url::parse(href) else {
        return href.to_string();
    };
    let is_google = parsed
        .host_str()
        .is_some_and(|h| h == "google.com" || h.ends_with(".google.com"));
    if !is_google || parsed.path() != "/url" {
        return href.to_string();
    }
    parsed
        .query_pairs()
        .find(|(k, v)| (k == "url" || k == "q") && v.starts_with("http"))
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| href.to_string())
}

fn is_tracking_key(key: &str) -> bool {
    key.to_ascii_lowercase().starts_with("utm_") || TRACKING_KEYS.contains(&key)
}

/// Drop `utm_*`, `ved`, `usg` and `ei` query parameters.
pub fn strip_tracking_params(href: &str) -> String {
    let Ok(mut parsed) = Url::parse(href) else {
        return href.to_string();
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !pairs.iter().any(|(k, _)| is_tracking_key(k)) {
        return href.to_string();
    }
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking_key(k)).collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    parsed.to_string()
}

/// True when host+path starts with one of `exclude` (e.g. `www.google.com/alerts`).
pub fn is_excluded(href: &str, exclude: &[String]) -> bool {
    let Ok(parsed) = Url::parse(href) else {
        return true;
    };
    let Some(host) = parsed.host_str() else {
        return true;
    };
    let location = format!("{}{}", host, parsed.path());
    exclude.iter().any(|prefix| location.starts_with(prefix.as_str()))
}

/// Unwrap, strip and filter one raw href.
pub fn clean_link(href: &str, exclude: &[String]) -> Option<String> {
    let href = href.trim();
    if !href.starts_with("http") {
        return None;
    }
    let cleaned = strip_tracking_params(&unwrap_google_redirect(href));
    (!is_excluded(&cleaned, exclude)).then_some(cleaned)
}

/// Text of the closest enclosing table cell or div, falling back to the anchor.
fn context_of(anchor: ElementRef<'_>, max_chars: usize) -> String {
    let enclosing = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "td" | "div"));
    let text = match enclosing {
        Some(el) => el.text().collect::<Vec<_>>().join(" "),
        None => anchor.text().collect::<Vec<_>>().join(" "),
    };
    truncate_chars(&collapse_whitespace(&text), max_chars)
}

/// Every usable link in an alert's HTML, first occurrence wins.
pub fn extract_alert_links(html: &str, exclude: &[String], max_context_chars: usize) -> Vec<AlertLink> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| {
            let url = clean_link(anchor.value().attr("href")?, exclude)?;
            Some(AlertLink {
                url,
                context: context_of(anchor, max_context_chars),
            })
        })
        .unique_by(|link| link.url.clone())
        .collect()
}
