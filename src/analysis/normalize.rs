//! Lenient readers for judgment objects.
//!
//! The reasoning service's numbers and field presence are never trusted:
//! metrics are clamped to 0–100 (default 50), flags are coerced to a known
//! shape, arrays and booleans always exist.

use serde_json::Value;

use super::{Flag, FlagType};
use crate::judgment::JudgmentObject;

pub const DEFAULT_METRIC: u8 = 50;
pub const DEFAULT_SEVERITY: u8 = 5;
pub const DEFAULT_CATEGORY: &str = "verification";

/// Clamp a numeric field to [0,100]; missing, non-numeric or non-finite → 50.
pub fn metric(obj: &JudgmentObject, key: &str) -> u8 {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(DEFAULT_METRIC)
}

/// String entries of an array field; other entries are dropped. Missing → empty.
pub fn string_list(obj: &JudgmentObject, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn boolean(obj: &JudgmentObject, key: &str, default: bool) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Non-empty trimmed string, or `None`.
pub fn text(obj: &JudgmentObject, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Scalar rendered as text (strings as-is, numbers/bools formatted); null/absent → `None`.
pub fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The `flags` array, each entry coerced; non-object entries are dropped.
pub fn flags(obj: &JudgmentObject) -> Vec<Flag> {
    obj.get("flags")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(flag).collect())
        .unwrap_or_default()
}

/// Coerce one flag: type → red|yellow (default yellow), severity → 1..=10
/// (default 5), category → default `verification`.
pub fn flag(value: &Value) -> Option<Flag> {
    let obj = value.as_object()?;
    let flag_type = match obj.get("type").and_then(Value::as_str) {
        Some(t) if t.trim().eq_ignore_ascii_case("red") => FlagType::Red,
        _ => FlagType::Yellow,
    };
    let severity = obj
        .get("severity")
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(1.0, 10.0) as u8)
        .unwrap_or(DEFAULT_SEVERITY);
    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("No details provided")
        .to_string();
    Some(Flag {
        flag_type,
        category,
        message,
        severity,
    })
}
