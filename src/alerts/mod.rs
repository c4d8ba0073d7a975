//! Alert collection: turn Google Alert notifications into input ledger rows.
//!
//! Two local sources are supported:
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | `.eml` exports | [`email`] | Filtered by sender and `lookback_days` |
//! | Atom feeds | [`feed`] | A file path or an `http(s)` URL |
//!
//! Links from every source are unwrapped from Google redirects, stripped of
//! tracking parameters, de-duplicated and prepended to the input ledger.

pub mod email;
pub mod feed;
pub mod links;

use crate::config::{AlertSettings, Config};
use crate::ledger::{Ledger, Record, URL};
use crate::models::{AlertLink, CONTEXT, CollectStats, IS_NEWS};
use chrono::Utc;
use itertools::Itertools;
use std::error::Error;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Links from every wanted message in `dir`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
fn collect_from_dir(dir: &Path, settings: &AlertSettings, stats: &mut CollectStats) -> Vec<AlertLink> {
    let files = match email::eml_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "Cannot read alert directory; skipping");
            return Vec::new();
        }
    };
    let now = Utc::now();
    let mut links = Vec::new();
    for path in files {
        let message = match email::read_eml(&path) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read message; skipping");
                continue;
            }
        };
        if !message.is_wanted(&settings.sender, settings.lookback_days, now) {
            debug!(path = %path.display(), from = ?message.from, "Message filtered out");
            continue;
        }
        stats.scanned_messages += 1;
        for html in &message.html_parts {
            links.extend(links::extract_alert_links(
                html,
                &settings.exclude_domains,
                settings.max_context_chars,
            ));
        }
    }
    links
}

async fn read_feed(source: &str) -> Result<String, Box<dyn Error>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source).await?.error_for_status()?;
        Ok(response.text().await?)
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

#[instrument(level = "info", skip_all, fields(%source))]
async fn collect_from_feed(source: &str, settings: &AlertSettings, stats: &mut CollectStats) -> Vec<AlertLink> {
    let xml = match read_feed(source).await {
        Ok(xml) => xml,
        Err(e) => {
            warn!(error = %e, "Cannot read alert feed; skipping");
            return Vec::new();
        }
    };
    match feed::parse_alert_feed(&xml, &settings.exclude_domains, settings.max_context_chars) {
        Ok(links) => {
            stats.scanned_feeds += 1;
            links
        }
        Err(e) => {
            warn!(error = %e, "Cannot parse alert feed; skipping");
            Vec::new()
        }
    }
}

/// Rows for the input ledger; `is_news` starts empty.
fn to_records(links: &[AlertLink]) -> Vec<Record> {
    links
        .iter()
        .map(|link| {
            Record::from([
                (URL.to_string(), link.url.clone()),
                (CONTEXT.to_string(), link.context.clone()),
                (IS_NEWS.to_string(), String::new()),
            ])
        })
        .collect()
}

/// Gather alert links from every configured source and prepend the new ones
/// to the input ledger.
#[instrument(level = "info", skip_all, fields(input = %config.data_paths.input_file.display()))]
pub async fn collect(config: &Config) -> Result<CollectStats, Box<dyn Error>> {
    let t0 = Instant::now();
    let settings = &config.alerts;
    let mut stats = CollectStats::default();

    if settings.eml_dirs.is_empty() && settings.feeds.is_empty() {
        warn!("No alert sources configured (alerts.eml_dirs / alerts.feeds)");
    }

    let mut links = Vec::new();
    for dir in &settings.eml_dirs {
        links.extend(collect_from_dir(dir, settings, &mut stats));
    }
    for source in &settings.feeds {
        links.extend(collect_from_feed(source, settings, &mut stats).await);
    }
    let links: Vec<AlertLink> = links.into_iter().unique_by(|l| l.url.clone()).collect();
    stats.links_found = links.len();

    let path = &config.data_paths.input_file;
    let mut ledger = Ledger::load(path)?;
    for column in [URL, CONTEXT, IS_NEWS] {
        ledger.ensure_column(column);
    }
    stats.new_links = ledger.prepend_new(&to_records(&links));
    ledger.save(path)?;

    info!(
        messages = stats.scanned_messages,
        feeds = stats.scanned_feeds,
        found = stats.links_found,
        new = stats.new_links,
        total = ledger.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Alert collection complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title type="html">ข่าวใหม่</title>
    <link href="https://www.google.com/url?url=https://news.example/new&amp;ct=ga"/>
    <content type="html">ร้อนจัด</content>
  </entry>
  <entry>
    <title type="html">ข่าวเดิม</title>
    <link href="https://news.example/old"/>
    <content type="html">เดิม</content>
  </entry>
</feed>"#;

    #[tokio::test]
    async fn test_collect_prepends_new_links() {
        let dir = tempfile::tempdir().unwrap();
        let feed_path = dir.path().join("alerts.xml");
        fs::write(&feed_path, FEED).unwrap();
        let input = dir.path().join("input.csv");
        fs::write(&input, "url,context,is_news,note\nhttps://news.example/old,เดิม,1,keep\n").unwrap();

        let mut config = Config::default();
        config.alerts.feeds = vec![
            feed_path.to_string_lossy().into_owned(),
            dir.path().join("missing.xml").to_string_lossy().into_owned(),
        ];
        config.alerts.eml_dirs = vec![dir.path().join("no-such-dir")];
        config.data_paths.input_file = input.clone();

        let stats = collect(&config).await.unwrap();
        assert_eq!(stats.scanned_feeds, 1);
        assert_eq!(stats.links_found, 2);
        assert_eq!(stats.new_links, 1);

        let ledger = Ledger::load(&input).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.url(0), "https://news.example/new");
        assert_eq!(ledger.get(0, CONTEXT), Some("ข่าวใหม่ ร้อนจัด"));
        assert_eq!(ledger.get(1, "note"), Some("keep"));
        assert_eq!(ledger.get(1, IS_NEWS), Some("1"));

        // second run adds nothing
        let again = collect(&config).await.unwrap();
        assert_eq!(again.new_links, 0);
    }

    #[tokio::test]
    async fn test_collect_creates_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_paths.input_file = dir.path().join("data").join("input.csv");
        let stats = collect(&config).await.unwrap();
        assert_eq!(stats, CollectStats::default());
        let ledger = Ledger::load(&config.data_paths.input_file).unwrap();
        assert_eq!(ledger.headers(), &[URL, CONTEXT, IS_NEWS]);
    }
}
