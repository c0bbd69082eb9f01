//! Decimal and date normalization for loosely typed API payloads
//!
//! The retailer API mixes native JSON numbers with locale-formatted strings
//! ("1,29"), and ISO 8601 timestamps with day-first dates. Everything here is
//! total: unparsable input becomes `None`, never an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Storage format for dates (SQLite-friendly, sorts lexicographically)
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Normalize a JSON value into a float
///
/// Accepts native numbers and strings using either `,` or `.` as decimal
/// separator. Returns `None` for null, booleans, containers and garbage.
pub fn parse_decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}

/// Normalize a locale-formatted decimal string
///
/// When both separators appear, the rightmost one is the decimal separator
/// and the other is treated as digit grouping ("1.234,56" and "1,234.56").
pub fn parse_decimal_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Normalize a JSON value into an integer (numbers, or numeric strings)
pub fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| parse_decimal_str(trimmed).map(|f| f.round() as i64))
        }
        _ => None,
    }
}

/// Normalize an external identifier (string or number) into a string
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a date/time string in ISO 8601 or a day-first locale variant
///
/// Offsets are dropped without conversion: the result is the wall-clock
/// time the source expressed. Date-only input becomes midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Parse a date/time carried in a JSON value
pub fn parse_datetime_value(value: &Value) -> Option<NaiveDateTime> {
    value.as_str().and_then(parse_datetime)
}

/// Format a date/time for storage
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Serde adapters that run the normalizer while deserializing payloads
///
/// Use with `#[serde(default, deserialize_with = "...")]`.
pub mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn decimal<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(super::parse_decimal))
    }

    pub fn integer<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(super::parse_integer))
    }

    pub fn id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(super::value_to_id))
    }

    /// Text field that tolerates numbers and treats blank strings as absent
    pub fn text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }))
    }

    /// Boolean that also accepts 0/1 and "true"/"false"
    pub fn flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_separators_agree() {
        assert_eq!(parse_decimal(&json!("1,29")), Some(1.29));
        assert_eq!(parse_decimal(&json!(1.29)), Some(1.29));
        assert_eq!(parse_decimal(&json!("1.29")), Some(1.29));
    }

    #[test]
    fn test_decimal_grouping() {
        assert_eq!(parse_decimal_str("1.234,56"), Some(1234.56));
        assert_eq!(parse_decimal_str("1,234.56"), Some(1234.56));
        assert_eq!(parse_decimal_str(" 12,5 € "), Some(12.5));
    }

    #[test]
    fn test_decimal_garbage_is_none() {
        assert_eq!(parse_decimal(&Value::Null), None);
        assert_eq!(parse_decimal(&json!(true)), None);
        assert_eq!(parse_decimal(&json!("")), None);
        assert_eq!(parse_decimal(&json!("abc")), None);
        assert_eq!(parse_decimal(&json!({"a": 1})), None);
    }

    #[test]
    fn test_integer_and_id() {
        assert_eq!(parse_integer(&json!(3)), Some(3));
        assert_eq!(parse_integer(&json!("7")), Some(7));
        assert_eq!(parse_integer(&json!("2,0")), Some(2));
        assert_eq!(value_to_id(&json!(1234)), Some("1234".to_string()));
        assert_eq!(value_to_id(&json!(" S01 ")), Some("S01".to_string()));
        assert_eq!(value_to_id(&json!("")), None);
        assert_eq!(value_to_id(&Value::Null), None);
    }

    #[test]
    fn test_parse_datetime_iso_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(18, 42, 5)
            .unwrap();
        assert_eq!(parse_datetime("2024-03-09T18:42:05Z"), Some(expected));
        assert_eq!(parse_datetime("2024-03-09T18:42:05+01:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-09T18:42:05.123"), Some(expected + chrono::Duration::milliseconds(123)));
        assert_eq!(parse_datetime("2024-03-09 18:42:05"), Some(expected));
    }

    #[test]
    fn test_parse_datetime_keeps_source_wall_clock() {
        let dt = parse_datetime("2024-03-09T23:30:00-05:00").unwrap();
        assert_eq!(format_datetime(&dt), "2024-03-09 23:30:00");
    }

    #[test]
    fn test_parse_datetime_locale_dates() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-03-09"), Some(midnight));
        assert_eq!(parse_datetime("09/03/2024"), Some(midnight));
        assert_eq!(parse_datetime("09-03-2024"), Some(midnight));
    }

    #[test]
    fn test_parse_datetime_garbage_is_none() {
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("yesterday"), None);
        assert_eq!(parse_datetime("2024-13-45"), None);
        assert_eq!(parse_datetime_value(&json!(12345)), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.199999999, 2), 0.2);
        assert_eq!(round_to(15.503875, 1), 15.5);
    }
}
