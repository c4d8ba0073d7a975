//! Boolean columns stored as `1`, `0` or null.

use super::{Normalized, ValidationError};

const NULL_VALUES: &[&str] = &[
    "ไม่ระบุ", "ไม่ทราบ", "ไม่แน่ใจ", "ไม่ชัดเจน", "ไม่มีข้อมูล", "ไม่ได้บันทึก", "ไม่ปรากฏ",
    "รอตรวจสอบ", "อยู่ระหว่างตรวจ", "unknown", "unclear", "unspecified", "pending",
    "not recorded", "not available", "not applicable", "na", "n/a", "n.a.", "null", "none",
    "empty", "missing", "tbd", "-", "_", "?", "??", "...",
];

const TRUE_VALUES: &[&str] = &[
    "มี", "ใช่", "จริง", "เป็น", "มีอาการ", "มีประวัติ", "เป็นโรค", "ป่วย", "พบ", "ตรวจพบ",
    "ได้รับการวินิจฉัย", "มีโรคประจำตัว", "ป่วยเป็น", "true", "yes", "positive", "present",
    "confirmed", "diagnosed", "found", "detected", "1", "1.0", "t", "y", "+", "✓",
];

const FALSE_VALUES: &[&str] = &[
    "ไม่มี", "ไม่ใช่", "ไม่จริง", "ไม่เป็น", "ไม่", "ไม่พบ", "ไม่มีอาการ", "ไม่มีประวัติ",
    "ไม่เป็นโรค", "ไม่ป่วย", "สุขภาพดี", "ปกติ", "ไม่มีโรคประจำตัว", "false", "no", "negative",
    "absent", "normal", "nil", "not found", "not present", "healthy", "0", "0.0", "f", "n",
    "✗", "x",
];

/// Uncertainty inside a longer answer; checked before the negative markers
/// since most Thai forms start with `ไม่`.
const NULL_MARKERS: &[&str] = &[
    "ไม่ระบุ", "ไม่ทราบ", "ไม่แน่ใจ", "ไม่แน่ชัด", "ไม่ชัดเจน", "ไม่มีข้อมูล", "ไม่ได้บันทึก",
    "รอตรวจสอบ", "อยู่ระหว่างตรวจ", "unknown", "unclear", "unspecified", "not recorded",
    "not available", "not applicable",
];

/// Words inside a longer answer that signal a positive.
const TRUE_MARKERS: &[&str] = &["มี", "เป็น", "ป่วย", "พบ", "yes", "has ", "diagnosed"];

/// Prefixes that turn a longer answer negative; checked before [`TRUE_MARKERS`].
const FALSE_MARKERS: &[&str] = &["ไม่", "ปฏิเสธ", "not ", "no ", "without"];

pub fn normalize_boolean(raw: &str) -> Result<Normalized, ValidationError> {
    let lower = raw.trim().to_lowercase();
    if NULL_VALUES.contains(&lower.as_str()) {
        return Ok(Normalized::null().with_note("unknown mapped to null"));
    }
    if FALSE_VALUES.contains(&lower.as_str()) {
        return Ok(Normalized::value("0"));
    }
    if TRUE_VALUES.contains(&lower.as_str()) {
        return Ok(Normalized::value("1"));
    }
    if NULL_MARKERS.iter().any(|m| lower.contains(m)) {
        return Ok(Normalized::null().with_note("partial unknown match"));
    }
    if FALSE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Ok(Normalized::value("0").with_note("partial negative match"));
    }
    if TRUE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Ok(Normalized::value("1").with_note("partial positive match"));
    }
    Err(ValidationError::UnknownBoolean(raw.to_string()))
}
