//! Categorical columns: provinces, regions, gender and configured vocabularies.

use super::Normalized;
use super::provinces::{self, UNKNOWN};
use crate::config::{BuiltinVocabulary, ColumnSpec};
use strsim::jaro_winkler;

const FUZZY_THRESHOLD: f64 = 0.85;

const MALE: &[&str] = &["ชาย", "เพศชาย", "ผู้ชาย", "นาย", "ด.ช.", "เด็กชาย", "male", "m", "man"];
const FEMALE: &[&str] = &[
    "หญิง", "เพศหญิง", "ผู้หญิง", "นาง", "นางสาว", "น.ส.", "ด.ญ.", "เด็กหญิง", "female", "f", "woman",
];

pub fn normalize_gender(raw: &str) -> &'static str {
    let lower = raw.trim().to_lowercase();
    if FEMALE.contains(&lower.as_str()) {
        return "หญิง";
    }
    if MALE.contains(&lower.as_str()) {
        return "ชาย";
    }
    // "หญิง" before "ชาย": neither contains the other, but "female" contains "male".
    if lower.contains("หญิง") || lower.contains("female") || lower.contains("woman") {
        "หญิง"
    } else if lower.contains("ชาย") || lower.contains("male") {
        "ชาย"
    } else {
        UNKNOWN
    }
}

/// Exact (case-insensitive) hit first, then the closest fuzzy match.
pub fn match_vocabulary(raw: &str, vocabulary: &[String]) -> Option<String> {
    let lower = raw.to_lowercase();
    if let Some(hit) = vocabulary.iter().find(|v| v.to_lowercase() == lower) {
        return Some(hit.clone());
    }
    vocabulary
        .iter()
        .map(|v| (v, jaro_winkler(&lower, &v.to_lowercase())))
        .filter(|(_, score)| *score >= FUZZY_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(v, _)| v.clone())
}

pub fn normalize_multiclass(raw: &str, column: &ColumnSpec) -> Normalized {
    let raw = raw.trim();
    match column.vocabulary_kind() {
        Some(BuiltinVocabulary::Province) => match provinces::normalize_province(raw) {
            Some(p) => Normalized::value(p.thai),
            None => Normalized::value(raw).with_note("province not recognised"),
        },
        Some(BuiltinVocabulary::Region) => match provinces::normalize_region(raw) {
            Some(region) => Normalized::value(region),
            None => Normalized::value(raw).with_note("region not recognised"),
        },
        Some(BuiltinVocabulary::Gender) => Normalized::value(normalize_gender(raw)),
        None if !column.vocabulary.is_empty() => match match_vocabulary(raw, &column.vocabulary) {
            Some(hit) => Normalized::value(hit),
            None => Normalized::value(raw).with_note("value outside vocabulary"),
        },
        None => Normalized::value(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataType;

    fn column(name: &str, vocabulary: &[&str]) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            data_type: DataType::Multiclass,
            enabled: true,
            extraction_hint: None,
            builtin_vocabulary: None,
            vocabulary: vocabulary.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_gender() {
        assert_eq!(normalize_gender("Female"), "หญิง");
        assert_eq!(normalize_gender("male"), "ชาย");
        assert_eq!(normalize_gender("เพศชาย อายุ 60"), "ชาย");
        assert_eq!(normalize_gender("?"), UNKNOWN);
    }

    #[test]
    fn test_province_column() {
        let col = column("location_province", &[]);
        assert_eq!(normalize_multiclass("โคราช", &col).value.as_deref(), Some("นครราชสีมา"));
        let unknown = normalize_multiclass("Atlantis", &col);
        assert_eq!(unknown.value.as_deref(), Some("Atlantis"));
        assert!(unknown.note.is_some());
    }

    #[test]
    fn test_region_column() {
        let col = column("region", &[]);
        assert_eq!(
            normalize_multiclass("อีสาน", &col).value.as_deref(),
            Some(provinces::NORTHEAST)
        );
    }

    #[test]
    fn test_configured_vocabulary() {
        let col = column("activity", &["Farming", "Construction", "Sports"]);
        assert_eq!(normalize_multiclass("farming", &col).value.as_deref(), Some("Farming"));
        assert_eq!(normalize_multiclass("Constructon", &col).value.as_deref(), Some("Construction"));
        assert_eq!(normalize_multiclass("Fishing", &col).value.as_deref(), Some("Fishing"));
    }
}
