//! Time-of-day columns, stored as `HH:MM:SS`.

use super::{Normalized, ValidationError, thai_digits_to_ascii};
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[:.](\d{2})(?:[:.](\d{2}))?\b").expect("valid regex")
});

/// Accepts `14:30`, `14:30:15`, `14.30` and `14.30 น.`.
pub fn normalize_time(raw: &str) -> Result<Normalized, ValidationError> {
    let ascii = thai_digits_to_ascii(raw);
    let parsed = TIME_RE.captures(&ascii).and_then(|caps| {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        let second: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
        NaiveTime::from_hms_opt(hour, minute, second)
    });
    match parsed {
        Some(time) => Ok(Normalized::value(time.format("%H:%M:%S").to_string())),
        None => Err(ValidationError::UnparseableTime(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(raw: &str) -> Option<String> {
        normalize_time(raw).ok().and_then(|n| n.value)
    }

    #[test]
    fn test_formats() {
        assert_eq!(value("14:30").as_deref(), Some("14:30:00"));
        assert_eq!(value("9:05:07").as_deref(), Some("09:05:07"));
        assert_eq!(value("เวลา 14.30 น.").as_deref(), Some("14:30:00"));
        assert_eq!(value("๑๐:๑๕").as_deref(), Some("10:15:00"));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(value("25:00"), None);
        assert_eq!(value("ช่วงบ่าย"), None);
    }
}
