//! Numeric and timestamp coercion for loosely-typed producer values.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Parse a JSON number or numeric string. Non-finite values are `None`.
pub fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// First alias whose value parses as a number.
pub fn first_number(raw: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|key| raw.get(*key))
        .find_map(as_f64)
}

/// First alias holding a non-negative byte count.
pub fn first_bytes(raw: &Map<String, Value>, aliases: &[&str]) -> Option<u64> {
    aliases
        .iter()
        .filter_map(|key| raw.get(*key))
        .filter_map(as_f64)
        .find(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
}

/// First alias holding a percentage, clamped to [0, 100].
pub fn first_percent(raw: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    first_number(raw, aliases).map(clamp_percent)
}

/// Process count; negative or missing values become 0.
pub fn count(raw: &Map<String, Value>, aliases: &[&str]) -> u64 {
    first_number(raw, aliases)
        .filter(|v| *v > 0.0)
        .map(|v| v.trunc() as u64)
        .unwrap_or(0)
}

pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` read as UTC.
pub fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn first_timestamp(raw: &Map<String, Value>, aliases: &[&str]) -> Option<DateTime<Utc>> {
    aliases
        .iter()
        .filter_map(|key| raw.get(*key))
        .find_map(as_timestamp)
}
