//! Normalisation of raw extracted values into the stored column formats.
//!
//! Each extracted cell goes through the validator selected by its column's
//! [`DataType`]. A validator either produces a [`Normalized`] value (possibly
//! null) or a [`ValidationError`]; the extraction engine stores null on error.

pub mod boolean;
pub mod date;
pub mod multiclass;
pub mod numeric;
pub mod provinces;
pub mod text;
pub mod time;

use crate::config::{AdvancedSettings, ColumnSpec, DataType};
use crate::ledger::is_null;
use thiserror::Error;
use tracing::debug;

pub use date::thai_month_name;
pub use provinces::province_region;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no number found in '{0}'")]
    NotANumber(String),

    #[error("{value} is outside the allowed range {min:?}..={max:?}")]
    OutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("unrecognised boolean value '{0}'")]
    UnknownBoolean(String),

    #[error("unable to parse date '{0}'")]
    UnparseableDate(String),

    #[error("date {date} is outside {min_year}..={max_year}")]
    DateOutOfRange {
        date: String,
        min_year: i32,
        max_year: i32,
    },

    #[error("future date not allowed: {0}")]
    FutureDate(String),

    #[error("unable to parse time '{0}'")]
    UnparseableTime(String),
}

/// A normalised cell plus an optional note about what was changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub value: Option<String>,
    pub note: Option<String>,
}

impl Normalized {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Normalise one raw cell for `column`.
pub fn normalize(
    raw: Option<&str>,
    column: &ColumnSpec,
    advanced: &AdvancedSettings,
) -> Result<Normalized, ValidationError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !is_null(v)) else {
        return Ok(Normalized::null());
    };
    match column.data_type {
        DataType::Integer => numeric::normalize_integer(raw, &column.name, advanced),
        DataType::Float => numeric::normalize_float(raw, &column.name, advanced),
        DataType::Date => date::normalize_date(raw, &advanced.date_rules),
        DataType::Time => time::normalize_time(raw),
        DataType::Boolean => boolean::normalize_boolean(raw),
        DataType::Multiclass => Ok(multiclass::normalize_multiclass(raw, column)),
        DataType::Text => Ok(text::normalize_text(raw, advanced.max_text_chars)),
    }
}

/// Like [`normalize`], but failures become null and are logged.
pub fn normalize_or_null(
    raw: Option<&str>,
    column: &ColumnSpec,
    advanced: &AdvancedSettings,
) -> Option<String> {
    match normalize(raw, column, advanced) {
        Ok(normalized) => {
            if let Some(note) = &normalized.note {
                debug!(column = %column.name, %note, "Value normalised");
            }
            normalized.value
        }
        Err(e) => {
            debug!(column = %column.name, error = %e, "Validation failed; storing null");
            None
        }
    }
}

/// Replace Thai digits (๐-๙) with ASCII digits.
pub fn thai_digits_to_ascii(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0E50}'..='\u{0E59}' => {
                char::from(b'0' + (c as u32 - 0x0E50) as u8)
            }
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: DataType) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            data_type,
            enabled: true,
            extraction_hint: None,
            builtin_vocabulary: None,
            vocabulary: Vec::new(),
        }
    }

    #[test]
    fn test_thai_digits() {
        assert_eq!(thai_digits_to_ascii("๑๕ มี.ค. ๒๕๖๗"), "15 มี.ค. 2567");
    }

    #[test]
    fn test_null_inputs_short_circuit() {
        let advanced = AdvancedSettings::default();
        let col = column("death_count", DataType::Integer);
        assert_eq!(normalize(None, &col, &advanced), Ok(Normalized::null()));
        assert_eq!(normalize(Some("None"), &col, &advanced), Ok(Normalized::null()));
    }

    #[test]
    fn test_dispatch_by_type() {
        let advanced = AdvancedSettings::default();
        let cases = [
            (column("death_count", DataType::Integer), "3 ราย", "3"),
            (column("body_temperature", DataType::Float), "40.56 องศา", "40.6"),
            (column("incident_date", DataType::Date), "15 มีนาคม 2567", "2024-03-15"),
            (column("incident_time", DataType::Time), "14.30 น.", "14:30:00"),
            (column("hypertension", DataType::Boolean), "มี", "1"),
            (column("location_province", DataType::Multiclass), "จ.เชียงใหม่", "เชียงใหม่"),
            (column("death_cause", DataType::Text), "<b>ลมแดด</b>", "ลมแดด"),
        ];
        for (col, raw, expected) in cases {
            let got = normalize(Some(raw), &col, &advanced).unwrap();
            assert_eq!(got.value.as_deref(), Some(expected), "column {}", col.name);
        }
    }

    #[test]
    fn test_normalize_or_null_swallows_errors() {
        let advanced = AdvancedSettings::default();
        let col = column("incident_date", DataType::Date);
        assert_eq!(normalize_or_null(Some("เมื่อวานนี้"), &col, &advanced), None);
    }
}
