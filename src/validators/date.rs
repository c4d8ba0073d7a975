//! Dates in Thai and English forms, normalised to ISO `YYYY-MM-DD`.
//!
//! Buddhist Era years (anything above 2100) are converted by subtracting 543.
//! Two-digit years of 50 and above are read as short Buddhist years (`67` is
//! 2567 BE, i.e. 2024); below 50 they are 20xx.

use super::{Normalized, ValidationError, thai_digits_to_ascii};
use crate::config::DateRules;
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

const BUDDHIST_ERA_CUTOFF: i32 = 2100;
const BUDDHIST_OFFSET: i32 = 543;

pub const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

const THAI_MONTH_ABBREVIATIONS: [&str; 12] = [
    "ม.ค.", "ก.พ.", "มี.ค.", "เม.ย.", "พ.ค.", "มิ.ย.", "ก.ค.", "ส.ค.", "ก.ย.", "ต.ค.", "พ.ย.", "ธ.ค.",
];

static ENGLISH_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b",
    )
    .expect("valid regex")
});

static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").expect("valid regex"));

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{2}|\d{4})\b").expect("valid regex"));

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Map a raw year to the Gregorian calendar.
fn gregorian_year(year: i32) -> i32 {
    match year {
        y if y > BUDDHIST_ERA_CUTOFF => y - BUDDHIST_OFFSET,
        y if y < 100 && y >= 50 => 2500 + y - BUDDHIST_OFFSET,
        y if y < 100 => 2000 + y,
        y => y,
    }
}

fn clean(raw: &str) -> String {
    let mut s = thai_digits_to_ascii(raw);
    for prefix in ["วันที่", "ว/ด/ป", "เมื่อ"] {
        s = s.replace(prefix, " ");
    }
    s.trim().to_string()
}

fn month_from_name(s: &str) -> Option<(u32, String)> {
    for (idx, name) in THAI_MONTHS.iter().enumerate() {
        if s.contains(name) {
            return Some((idx as u32 + 1, s.replace(name, " ")));
        }
    }
    for (idx, abbr) in THAI_MONTH_ABBREVIATIONS.iter().enumerate() {
        if s.contains(abbr) {
            return Some((idx as u32 + 1, s.replace(abbr, " ")));
        }
    }
    let caps = ENGLISH_MONTH_RE.captures(s)?;
    let word = caps.get(1)?;
    let month = match &word.as_str().to_lowercase()[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    let rest = format!("{} {}", &s[..word.start()], &s[word.end()..]);
    Some((month, rest))
}

fn parse_with_month_name(s: &str) -> Option<NaiveDate> {
    let (month, rest) = month_from_name(s)?;
    let numbers: Vec<i32> = DIGITS_RE
        .find_iter(&rest)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    let (mut day, mut year) = (*numbers.first()?, *numbers.get(1)?);
    // "2024 March 15"
    if day > 31 && year <= 31 {
        std::mem::swap(&mut day, &mut year);
    }
    NaiveDate::from_ymd_opt(gregorian_year(year), month, u32::try_from(day).ok()?)
}

fn parse_numeric(s: &str) -> Option<NaiveDate> {
    if let Some(caps) = ISO_RE.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(gregorian_year(year), month, day);
    }
    let caps = NUMERIC_RE.captures(s)?;
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    let year = gregorian_year(caps[3].parse().ok()?);
    // Day-first unless that is impossible.
    NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}

/// Parse a date in any supported form.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return None;
    }
    parse_with_month_name(&cleaned).or_else(|| parse_numeric(&cleaned))
}

pub fn normalize_date(raw: &str, rules: &DateRules) -> Result<Normalized, ValidationError> {
    let date = parse_date(raw).ok_or_else(|| ValidationError::UnparseableDate(raw.to_string()))?;
    if date.year() < rules.min_year || date.year() > rules.max_year {
        return Err(ValidationError::DateOutOfRange {
            date: date.to_string(),
            min_year: rules.min_year,
            max_year: rules.max_year,
        });
    }
    if !rules.allow_future_dates && date > Local::now().date_naive() {
        return Err(ValidationError::FutureDate(date.to_string()));
    }
    Ok(Normalized::value(date.format("%Y-%m-%d").to_string()))
}

/// Thai month name of an ISO date (or any parseable date).
pub fn thai_month_name(date: &str) -> Option<&'static str> {
    let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date(date))?;
    THAI_MONTHS.get(parsed.month0() as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso(raw: &str) -> Option<String> {
        parse_date(raw).map(|d| d.to_string())
    }

    #[test]
    fn test_thai_month_names() {
        assert_eq!(iso("15 มีนาคม 2567").as_deref(), Some("2024-03-15"));
        assert_eq!(iso("วันที่ 3 ม.ค. 67").as_deref(), Some("2024-01-03"));
        assert_eq!(iso("เมื่อ ๒๐ เม.ย. ๒๕๖๖").as_deref(), Some("2023-04-20"));
        assert_eq!(iso("1 มิ.ย. 2024").as_deref(), Some("2024-06-01"));
    }

    #[test]
    fn test_english_month_names() {
        assert_eq!(iso("April 5, 2024").as_deref(), Some("2024-04-05"));
        assert_eq!(iso("12 Sept 2023").as_deref(), Some("2023-09-12"));
        assert_eq!(iso("2024 March 15").as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn test_numeric_forms() {
        assert_eq!(iso("15/03/2024").as_deref(), Some("2024-03-15"));
        assert_eq!(iso("15/03/2567").as_deref(), Some("2024-03-15"));
        assert_eq!(iso("3/20/2024").as_deref(), Some("2024-03-20"));
        assert_eq!(iso("2024-03-15").as_deref(), Some("2024-03-15"));
        assert_eq!(iso("20-3-67").as_deref(), Some("2024-03-20"));
        assert_eq!(iso("05/06/24").as_deref(), Some("2024-06-05"));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(iso("เมื่อวานนี้"), None);
        assert_eq!(iso("31/31/2024"), None);
        assert_eq!(iso(""), None);
    }

    #[test]
    fn test_range_rules() {
        let rules = DateRules::default();
        assert!(matches!(
            normalize_date("15/03/2019", &rules),
            Err(ValidationError::DateOutOfRange { .. })
        ));
        let future = DateRules {
            max_year: 2100,
            ..DateRules::default()
        };
        assert!(matches!(
            normalize_date("01/01/2099", &future),
            Err(ValidationError::FutureDate(_))
        ));
        assert_eq!(
            normalize_date("15 มีนาคม 2567", &rules).unwrap().value.as_deref(),
            Some("2024-03-15")
        );
    }

    #[test]
    fn test_thai_month_name() {
        assert_eq!(thai_month_name("2024-04-13"), Some("เมษายน"));
        assert_eq!(thai_month_name("13/12/2023"), Some("ธันวาคม"));
        assert_eq!(thai_month_name("not a date"), None);
    }
}
