//! Incremental article scraping.
//!
//! The scraper widens the alert ledger with `content` and `scrape_status`.
//! It follows a two-phase pattern:
//!
//! 1. **Planning**: decide per row whether it already has content, is on a
//!    skipped platform, is blocked, or must be fetched
//! 2. **Fetching**: download and extract the pending rows concurrently
//!
//! Rows that already hold content are never touched, so re-running the stage
//! only fetches what is missing.
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `ok` | Content extracted |
//! | `error: fetch` | Request failed or returned non-2xx |
//! | `error: extract` | Page fetched but no usable text found |
//! | `skipped: platform` | Video/social platform, never fetched |

pub mod fetch;

use crate::config::{Config, ScrapeSettings};
use crate::ledger::{Ledger, is_null};
use crate::models::{CONTENT, SCRAPE_STATUS, ScrapeStats, ScrapeStatus};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::error::Error;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// True when a content cell is null or too short to count as scraped.
pub fn needs_content(cell: Option<&str>, min_chars: usize) -> bool {
    match cell {
        None => true,
        Some(c) if is_null(c) => true,
        Some(c) => c.trim().chars().count() <= min_chars,
    }
}

/// True when the URL belongs to a platform that is never fetched.
pub fn should_skip_platform(url: &str, platforms: &[String]) -> bool {
    let lower = url.to_lowercase();
    platforms.iter().any(|p| lower.contains(&p.to_lowercase()))
}

pub fn compile_blocked(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

pub fn is_blocked_domain(url: &str, blocked: &[Regex]) -> bool {
    blocked.iter().any(|re| re.is_match(url))
}

/// What to do with one row.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Keep,
    Blocked,
    SkipPlatform,
    Fetch(String),
}

fn plan_row(ledger: &Ledger, row: usize, settings: &ScrapeSettings, blocked: &[Regex]) -> Plan {
    let url = ledger.url(row);
    if is_blocked_domain(url, blocked) {
        return Plan::Blocked;
    }
    if !needs_content(ledger.get(row, CONTENT), settings.min_content_chars) {
        return Plan::Keep;
    }
    if should_skip_platform(url, &settings.skip_platforms) {
        return Plan::SkipPlatform;
    }
    Plan::Fetch(url.to_string())
}

#[instrument(level = "debug", skip_all, fields(%url))]
async fn scrape_one(client: &reqwest::Client, url: &str, min_chars: usize) -> (ScrapeStatus, Option<String>) {
    let html = match fetch::fetch_html(client, url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "Fetch failed");
            return (ScrapeStatus::FetchError, None);
        }
    };
    match fetch::extract_article_text(&html) {
        Some(text) if text.chars().count() > min_chars => (ScrapeStatus::Ok, Some(text)),
        _ => {
            warn!("No usable article text");
            (ScrapeStatus::ExtractError, None)
        }
    }
}

/// Fill `content` for every row of `input` (merged into `output`) that lacks it.
///
/// Rows already present in `output` keep their content; new URLs from
/// `input` are appended before planning. The result is sorted by URL.
#[instrument(level = "info", skip_all, fields(input = %input.display(), output = %output.display()))]
pub async fn scrape(config: &Config, input: &Path, output: &Path) -> Result<ScrapeStats, Box<dyn Error>> {
    let t0 = Instant::now();
    let settings = &config.scraping;
    let blocked = compile_blocked(&settings.blocked_domains)?;

    let mut ledger = Ledger::load(output)?;
    if input != output {
        let appended = ledger.append_rows(&Ledger::load(input)?);
        debug!(appended, "Merged new input rows");
    }
    ledger.ensure_column(CONTENT);
    ledger.ensure_column(SCRAPE_STATUS);

    let mut stats = ScrapeStats {
        total_urls: ledger.len(),
        ..Default::default()
    };
    let mut jobs = Vec::new();
    for row in 0..ledger.len() {
        match plan_row(&ledger, row, settings, &blocked) {
            Plan::Keep => stats.already_had_content += 1,
            Plan::Blocked => {
                debug!(url = %ledger.url(row), "Blocked domain; row left untouched");
                stats.skipped += 1;
            }
            Plan::SkipPlatform => {
                ledger.set(row, SCRAPE_STATUS, ScrapeStatus::SkippedPlatform.as_str());
                stats.skipped += 1;
            }
            Plan::Fetch(url) => jobs.push((row, url)),
        }
    }
    stats.newly_scraped = jobs.len();
    info!(
        total = stats.total_urls,
        already_had_content = stats.already_had_content,
        to_fetch = jobs.len(),
        skipped = stats.skipped,
        "Scrape plan ready"
    );

    if !jobs.is_empty() {
        let client = fetch::build_client(settings)?;
        let min_chars = settings.min_content_chars;
        let results: Vec<(usize, ScrapeStatus, Option<String>)> = stream::iter(jobs)
            .map(|(row, url)| {
                let client = &client;
                async move {
                    let (status, content) = scrape_one(client, &url, min_chars).await;
                    (row, status, content)
                }
            })
            .buffer_unordered(settings.concurrency)
            .collect()
            .await;

        for (row, status, content) in results {
            if status == ScrapeStatus::Ok {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
            if let Some(content) = content {
                ledger.set(row, CONTENT, content);
            }
            ledger.set(row, SCRAPE_STATUS, status.as_str());
        }
    }

    ledger.sort_by_url();
    ledger.save(output)?;
    info!(
        total = stats.total_urls,
        newly_scraped = stats.newly_scraped,
        successful = stats.successful,
        failed = stats.failed,
        skipped = stats.skipped,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Scraping complete"
    );
    Ok(stats)
}
