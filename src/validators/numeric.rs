//! Integer and float columns.

use super::{Normalized, ValidationError, thai_digits_to_ascii};
use crate::config::{AdvancedSettings, ColumnRule};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:,\d{3})*(?:\.\d+)?").expect("valid regex"));

/// First number in `text`, with Thai digits and thousands separators handled.
pub fn first_number(text: &str) -> Option<f64> {
    let ascii = thai_digits_to_ascii(text);
    let m = NUMBER_RE.find(&ascii)?;
    m.as_str().replace(',', "").parse().ok()
}

/// Bounds for a column: configured rules first, then the age default.
fn rule_for(column: &str, advanced: &AdvancedSettings) -> Option<ColumnRule> {
    if let Some(rule) = advanced.column_validation_rules.get(column) {
        return Some(rule.clone());
    }
    let lower = column.to_lowercase();
    if lower.contains("age") || lower.contains("อายุ") {
        return Some(ColumnRule {
            min: Some(0.0),
            max: Some(120.0),
            clamp: true,
        });
    }
    None
}

fn apply_rule(value: f64, rule: Option<ColumnRule>) -> Result<(f64, Option<String>), ValidationError> {
    let Some(rule) = rule else {
        return Ok((value, None));
    };
    let below = rule.min.is_some_and(|min| value < min);
    let above = rule.max.is_some_and(|max| value > max);
    if !below && !above {
        return Ok((value, None));
    }
    if !rule.clamp {
        return Err(ValidationError::OutOfRange {
            value,
            min: rule.min,
            max: rule.max,
        });
    }
    let clamped = match (below, rule.min, rule.max) {
        (true, Some(min), _) => min,
        (_, _, Some(max)) => max,
        _ => value,
    };
    Ok((clamped, Some(format!("clamped {value} to {clamped}"))))
}

pub fn normalize_integer(
    raw: &str,
    column: &str,
    advanced: &AdvancedSettings,
) -> Result<Normalized, ValidationError> {
    let number = first_number(raw).ok_or_else(|| ValidationError::NotANumber(raw.to_string()))?;
    let (value, note) = apply_rule(number.round(), rule_for(column, advanced))?;
    let normalized = Normalized::value(format!("{}", value as i64));
    Ok(match note {
        Some(note) => normalized.with_note(note),
        None => normalized,
    })
}

pub fn normalize_float(
    raw: &str,
    column: &str,
    advanced: &AdvancedSettings,
) -> Result<Normalized, ValidationError> {
    let number = first_number(raw).ok_or_else(|| ValidationError::NotANumber(raw.to_string()))?;
    let (value, note) = apply_rule(number, rule_for(column, advanced))?;
    let normalized = Normalized::value(format!("{:.1}", (value * 10.0).round() / 10.0));
    Ok(match note {
        Some(note) => normalized.with_note(note),
        None => normalized,
    })
}
