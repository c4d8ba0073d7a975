//! Column names, row statuses and per-stage statistics.
//!
//! Rows themselves live in [`crate::ledger::Ledger`]; this module names the
//! columns each stage adds and the values it writes into them:
//!
//! - alert record: `url`, `context`, `is_news`
//! - prepared record: + `content`, `scrape_status`
//! - classified record: + `is_relevant`, `classification_confidence`,
//!   `classification_method`
//! - heat record: + one column per enabled extraction field, plus
//!   `extraction_status`, `processing_status`, `extracted_at`

use serde::Serialize;
use std::fmt;

pub const CONTEXT: &str = "context";
pub const IS_NEWS: &str = "is_news";
pub const CONTENT: &str = "content";
pub const SCRAPE_STATUS: &str = "scrape_status";
pub const IS_RELEVANT: &str = "is_relevant";
pub const CLASSIFICATION_CONFIDENCE: &str = "classification_confidence";
pub const CLASSIFICATION_METHOD: &str = "classification_method";
pub const EXTRACTION_STATUS: &str = "extraction_status";
pub const PROCESSING_STATUS: &str = "processing_status";
pub const EXTRACTED_AT: &str = "extracted_at";
/// Derived from the province column.
pub const REGION: &str = "region";
/// Derived from the first date column.
pub const MONTH_TH: &str = "month_th";

/// A link pulled out of an alert, before it reaches the input ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertLink {
    pub url: String,
    pub context: String,
}

/// Outcome of scraping one URL, as written to `scrape_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Ok,
    FetchError,
    ExtractError,
    SkippedPlatform,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Ok => "ok",
            ScrapeStatus::FetchError => "error: fetch",
            ScrapeStatus::ExtractError => "error: extract",
            ScrapeStatus::SkippedPlatform => "skipped: platform",
        }
    }

    /// Parse a status cell. Older ledgers wrote `success`/`failed`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "ok" | "success" => Some(ScrapeStatus::Ok),
            "error: fetch" | "failed" => Some(ScrapeStatus::FetchError),
            "error: extract" => Some(ScrapeStatus::ExtractError),
            "skipped: platform" => Some(ScrapeStatus::SkippedPlatform),
            _ => None,
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a relevance decision was reached, as written to `classification_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMethod {
    /// The model answered in a parseable way.
    Llm,
    /// The model answered but no 0/1 could be found.
    LlmUnparsed,
    /// The request failed after retries.
    LlmError,
    /// Content too short to classify; never sent.
    SkippedEmpty,
}

impl ClassificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMethod::Llm => "llm",
            ClassificationMethod::LlmUnparsed => "llm_unparsed",
            ClassificationMethod::LlmError => "llm_error",
            ClassificationMethod::SkippedEmpty => "skipped_empty",
        }
    }
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relevance decision for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub is_relevant: bool,
    pub confidence: f64,
    pub method: ClassificationMethod,
}

impl Classification {
    pub fn irrelevant(method: ClassificationMethod) -> Self {
        Self {
            is_relevant: false,
            confidence: 0.0,
            method,
        }
    }
}

/// Render a boolean the way the ledgers store it.
pub fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Parse a stored flag cell (`1`, `1.0`, `true`).
pub fn is_flag_set(cell: Option<&str>) -> bool {
    matches!(
        cell.map(str::trim),
        Some("1") | Some("1.0") | Some("true") | Some("True")
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    pub scanned_messages: usize,
    pub scanned_feeds: usize,
    pub links_found: usize,
    pub new_links: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStats {
    pub total_urls: usize,
    pub already_had_content: usize,
    pub newly_scraped: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub total_input: usize,
    pub already_processed: usize,
    pub new_records: usize,
    pub classified_relevant: usize,
    pub classified_irrelevant: usize,
    pub extraction_success: usize,
    pub extraction_failed: usize,
    pub processing_time_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_status_strings() {
        for status in [
            ScrapeStatus::Ok,
            ScrapeStatus::FetchError,
            ScrapeStatus::ExtractError,
            ScrapeStatus::SkippedPlatform,
        ] {
            assert_eq!(ScrapeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ScrapeStatus::parse("success"), Some(ScrapeStatus::Ok));
        assert_eq!(ScrapeStatus::parse(""), None);
    }

    #[test]
    fn test_flags() {
        assert_eq!(flag(true), "1");
        assert!(is_flag_set(Some("1")));
        assert!(is_flag_set(Some(" 1.0 ")));
        assert!(!is_flag_set(Some("0")));
        assert!(!is_flag_set(None));
    }

    #[test]
    fn test_stats_serialize() {
        let stats = ScrapeStats {
            total_urls: 3,
            successful: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"total_urls\":3"));
    }
}
