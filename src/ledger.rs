//! URL-keyed CSV tables shared by every stage.
//!
//! A [`Ledger`] is an ordered header list plus rows of string cells. Stages
//! only ever widen a ledger (new columns) or add rows; unknown columns from
//! the input are carried through untouched and in order.

use chrono::Local;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Name of the key column.
pub const URL: &str = "url";

/// Header names accepted in place of `url`.
const URL_ALIASES: [&str; 6] = ["URL", "Url", "link", "Link", "href", "Href"];

/// Cell spellings that mean "no value".
const NULL_MARKERS: [&str; 6] = ["nan", "NaN", "None", "null", "<NA>", "NULL"];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no URL-like column in {0} (expected url/link/href)")]
    MissingUrlColumn(PathBuf),
}

/// A field-name to value map used to insert rows.
pub type Record = BTreeMap<String, String>;

/// True when a cell holds no usable value.
pub fn is_null(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || NULL_MARKERS.contains(&trimmed)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Ledger {
    /// An empty ledger with the given columns.
    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            headers: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Read a CSV file. A missing file is an empty ledger.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            debug!("Ledger file does not exist; starting empty");
            return Ok(Self::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;

        let mut headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        if !headers.iter().any(|h| h == URL) {
            match headers.iter().position(|h| URL_ALIASES.contains(&h.as_str())) {
                Some(pos) => headers[pos] = URL.to_string(),
                None if headers.iter().all(|h| h.is_empty()) => return Ok(Self::default()),
                None => return Err(LedgerError::MissingUrlColumn(path.to_path_buf())),
            }
        }

        let width = headers.len();
        let mut ledger = Self {
            headers,
            rows: Vec::new(),
        };
        let mut seen = HashSet::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            let extra = row.len().saturating_sub(width);
            row.resize(width, String::new());
            let url = row[ledger.url_index()].trim().to_string();
            if url.is_empty() {
                continue;
            }
            if extra > 0 {
                warn!(%url, extra, columns = width, "Row has more fields than the header; extra fields dropped");
            }
            if !seen.insert(url.clone()) {
                warn!(%url, "Duplicate URL in ledger; keeping the first row");
                continue;
            }
            ledger.rows.push(row);
        }
        debug!(rows = ledger.rows.len(), columns = width, "Loaded ledger");
        Ok(ledger)
    }

    /// Write the ledger, replacing `path` atomically.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        debug!(rows = self.rows.len(), "Saved ledger");
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Add a column of empty cells if it is not there yet; returns its index.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    fn url_index(&self) -> usize {
        self.column_index(URL).unwrap_or(0)
    }

    /// Cell value, `None` when the column is absent.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Cell value with nulls mapped to `None`.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        self.get(row, column).filter(|v| !is_null(v))
    }

    /// Set a cell, widening the header when needed.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let idx = self.ensure_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            r[idx] = value.into();
        }
    }

    pub fn url(&self, row: usize) -> &str {
        let idx = self.url_index();
        self.rows.get(row).map(|r| r[idx].as_str()).unwrap_or("")
    }

    pub fn urls(&self) -> HashSet<String> {
        (0..self.rows.len()).map(|i| self.url(i).to_string()).collect()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        (0..self.rows.len()).any(|i| self.url(i) == url)
    }

    fn row_from_record(&mut self, record: &Record) -> Vec<String> {
        for key in record.keys() {
            self.ensure_column(key);
        }
        self.headers
            .iter()
            .map(|h| record.get(h).cloned().unwrap_or_default())
            .collect()
    }

    /// Append one record unless its URL is already present.
    pub fn push_record(&mut self, record: &Record) -> bool {
        let Some(url) = record.get(URL).filter(|u| !u.trim().is_empty()) else {
            return false;
        };
        if self.contains_url(url) {
            return false;
        }
        self.ensure_column(URL);
        let row = self.row_from_record(record);
        self.rows.push(row);
        true
    }

    /// Insert records with unseen URLs at the top, in their given order.
    pub fn prepend_new(&mut self, records: &[Record]) -> usize {
        self.ensure_column(URL);
        let mut existing = self.urls();
        let mut fresh = Vec::new();
        for record in records {
            let Some(url) = record.get(URL).filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            if existing.insert(url.clone()) {
                fresh.push(self.row_from_record(record));
            }
        }
        let width = self.headers.len();
        for row in &mut fresh {
            row.resize(width, String::new());
        }
        let inserted = fresh.len();
        fresh.append(&mut self.rows);
        self.rows = fresh;
        inserted
    }

    /// Append the rows of `other` whose URL is new; headers are unioned.
    pub fn append_rows(&mut self, other: &Ledger) -> usize {
        for header in &other.headers {
            self.ensure_column(header);
        }
        let mut existing = self.urls();
        let mut appended = 0;
        for i in 0..other.len() {
            let url = other.url(i).to_string();
            if !existing.insert(url) {
                continue;
            }
            let row = self
                .headers
                .iter()
                .map(|h| other.get(i, h).unwrap_or_default().to_string())
                .collect();
            self.rows.push(row);
            appended += 1;
        }
        appended
    }

    /// A copy holding only rows for which `keep` is true.
    pub fn filtered(&self, mut keep: impl FnMut(&Ledger, usize) -> bool) -> Ledger {
        let rows = (0..self.rows.len())
            .filter(|&i| keep(self, i))
            .map(|i| self.rows[i].clone())
            .collect();
        Ledger {
            headers: self.headers.clone(),
            rows,
        }
    }

    pub fn sort_by_url(&mut self) {
        let idx = self.url_index();
        self.rows.sort_by(|a, b| a[idx].cmp(&b[idx]));
    }
}

/// Copy `path` to `dir/<stem>_backup_<timestamp>.csv`. Nothing happens when
/// `path` does not exist.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn backup(path: &Path, dir: &Path, stem: &str) -> Result<Option<PathBuf>, LedgerError> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let target = dir.join(format!("{stem}_backup_{stamp}.csv"));
    std::fs::copy(path, &target)?;
    info!(backup = %target.display(), "Backup created");
    Ok(Some(target))
}
