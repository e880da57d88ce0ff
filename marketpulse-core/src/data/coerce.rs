//! Loose date and number coercion for JSON and HTML payloads.
//!
//! Upstream datasets disagree on how they spell a date (`2024-01-02`,
//! `20240102`, `2024-01-02T00:00:00.000`, epoch milliseconds) and on whether
//! numbers arrive as numbers or strings. Anything that cannot be read becomes
//! `None` and the row is dropped by the caller.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

/// Parse a date out of a JSON value.
pub fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if (1900_01_01..=2100_12_31).contains(&raw) {
                parse_date_str(&raw.to_string())
            } else if raw.abs() >= 100_000_000_000 {
                DateTime::from_timestamp_millis(raw).map(|dt| dt.date_naive())
            } else {
                DateTime::from_timestamp(raw, 0).map(|dt| dt.date_naive())
            }
        }
        _ => None,
    }
}

/// Parse a date string in any of the accepted spellings. A time component
/// after `T` or a space is ignored.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Parse a number out of a JSON value; thousands separators and a trailing
/// `%` are tolerated in strings.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_f64_str(s),
        _ => None,
    }
}

pub fn parse_f64_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "--" {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
