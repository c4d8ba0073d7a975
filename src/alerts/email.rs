//! Alert emails exported as `.eml` files.

use chrono::{DateTime, Duration, Utc};
use mail_parser::MessageParser;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// The parts of a message the collector cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub from: Option<String>,
    pub received: Option<DateTime<Utc>>,
    pub html_parts: Vec<String>,
}

impl AlertMessage {
    /// From the configured sender and no older than `lookback_days`.
    ///
    /// A message without a parseable date is kept.
    pub fn is_wanted(&self, sender: &str, lookback_days: i64, now: DateTime<Utc>) -> bool {
        let from_sender = self
            .from
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case(sender));
        let recent = self
            .received
            .is_none_or(|d| d >= now - Duration::days(lookback_days));
        from_sender && recent
    }
}

/// Parse raw RFC 822 bytes.
pub fn parse_eml(bytes: &[u8]) -> Option<AlertMessage> {
    let message = MessageParser::default().parse(bytes)?;
    let from = message
        .from()
        .and_then(|addr| addr.first())
        .and_then(|addr| addr.address())
        .map(|a| a.to_string());
    let received = message
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0));
    let html_parts = (0..message.html_body_count())
        .filter_map(|i| message.body_html(i).map(|b| b.into_owned()))
        .collect();
    Some(AlertMessage {
        from,
        received,
        html_parts,
    })
}

#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn read_eml(path: &Path) -> Result<Option<AlertMessage>, Box<dyn Error>> {
    let bytes = std::fs::read(path)?;
    let parsed = parse_eml(&bytes);
    if parsed.is_none() {
        debug!("Not a parseable message");
    }
    Ok(parsed)
}

/// `.eml` files directly inside `dir`, sorted by name.
pub fn eml_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        })
        .collect();
    files.sort();
    Ok(files)
}
