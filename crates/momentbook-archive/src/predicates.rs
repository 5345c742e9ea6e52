//! Leaf predicates and lossy coercions over untyped JSON.
//!
//! The predicates answer "does this value already have the right shape";
//! the validator uses nothing else to inspect a candidate. The coercions are
//! the normalizer's tools: each one either recovers a typed value from a
//! loosely-shaped field or reports that it had to fall back to a default.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const LOCAL_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// A JSON number with a finite value.
pub fn is_finite_number(value: &Value) -> bool {
    value.as_f64().is_some_and(f64::is_finite)
}

/// A JSON string with at least one non-whitespace character.
pub fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|text| !text.trim().is_empty())
}

/// Parse an ISO-8601 timestamp: RFC 3339 with an offset, a local
/// date-time (read as UTC), or a bare calendar date (midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in LOCAL_DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

pub fn is_timestamp_str(text: &str) -> bool {
    parse_timestamp(text).is_some()
}

/// A JSON string holding a syntactically valid ISO-8601 timestamp.
pub fn is_timestamp(value: &Value) -> bool {
    value.as_str().is_some_and(is_timestamp_str)
}

/// An object carrying finite numeric `lat` and `lng`.
pub fn is_lat_lng(value: &Value) -> bool {
    lat_lng(value).is_some()
}

pub fn lat_lng(value: &Value) -> Option<(f64, f64)> {
    let object = value.as_object()?;
    let lat = object.get("lat").filter(|v| is_finite_number(v))?.as_f64()?;
    let lng = object.get("lng").filter(|v| is_finite_number(v))?.as_f64()?;
    Some((lat, lng))
}

/// Recover a whole number from a number or a numeric string. Fractional
/// values are rounded.
pub fn whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(round_whole)),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(round_whole)
            })
        }
        _ => None,
    }
}

/// Recover epoch milliseconds from a number, a numeric string, or an
/// ISO-8601 string.
pub fn epoch_millis(value: &Value) -> Option<i64> {
    whole_number(value).or_else(|| {
        value
            .as_str()
            .and_then(|text| parse_timestamp(text.trim()))
            .map(|at| at.timestamp_millis())
    })
}

fn round_whole(value: f64) -> i64 {
    // `as` saturates at the i64 bounds.
    value.round() as i64
}

/// A string, or a number rendered in decimal (legacy exporters emitted
/// numeric identifiers).
pub fn string_like(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Render a field for an error message: compact JSON, or `undefined` when
/// the field is absent altogether.
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "undefined".to_string(),
    }
}

/// The outcome of a lossy coercion: the value to use, and whether it was
/// substituted rather than recovered from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coerced<T> {
    pub value: T,
    pub defaulted: bool,
}

impl<T> Coerced<T> {
    pub fn kept(value: T) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    pub fn defaulted(value: T) -> Self {
        Self {
            value,
            defaulted: true,
        }
    }
}

/// Coerce a field the canonical document requires. An absent or
/// unrecoverable field falls back to `fallback()`.
pub fn coerce_required<T>(
    field: Option<&Value>,
    parse: impl FnOnce(&Value) -> Option<T>,
    fallback: impl FnOnce() -> T,
) -> Coerced<T> {
    match field.and_then(parse) {
        Some(value) => Coerced::kept(value),
        None => Coerced::defaulted(fallback()),
    }
}

/// Coerce an optional field. Absent and `null` are legitimately empty;
/// only a present but unrecoverable value counts as defaulted.
pub fn coerce_optional<T>(
    field: Option<&Value>,
    parse: impl FnOnce(&Value) -> Option<T>,
) -> Coerced<Option<T>> {
    match field {
        None | Some(Value::Null) => Coerced::kept(None),
        Some(raw) => match parse(raw) {
            Some(value) => Coerced::kept(Some(value)),
            None => Coerced::defaulted(None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finite_numbers() {
        assert!(is_finite_number(&json!(0)));
        assert!(is_finite_number(&json!(-12.5)));
        assert!(is_finite_number(&json!(1_700_000_000_000_i64)));
        assert!(!is_finite_number(&json!("1")));
        assert!(!is_finite_number(&Value::Null));
    }

    #[test]
    fn non_empty_strings() {
        assert!(is_non_empty_string(&json!("p1")));
        assert!(!is_non_empty_string(&json!("")));
        assert!(!is_non_empty_string(&json!("   ")));
        assert!(!is_non_empty_string(&json!(7)));
    }

    #[test]
    fn timestamps_accept_iso_forms() {
        assert!(is_timestamp_str("2024-05-01T10:00:00Z"));
        assert!(is_timestamp_str("2024-05-01T10:00:00.123+09:00"));
        assert!(is_timestamp_str("2024-05-01T10:00:00"));
        assert!(is_timestamp_str("2024-05-01T10:00"));
        assert!(is_timestamp_str("2024-05-01"));
    }

    #[test]
    fn timestamps_reject_garbage() {
        assert!(!is_timestamp_str("not a date"));
        assert!(!is_timestamp_str("2024-13-01"));
        assert!(!is_timestamp_str(""));
        assert!(!is_timestamp(&json!(1_700_000_000_000_i64)));
    }

    #[test]
    fn date_only_is_midnight_utc() {
        let parsed = parse_timestamp("1970-01-02").unwrap();
        assert_eq!(parsed.timestamp_millis(), 86_400_000);
    }

    #[test]
    fn lat_lng_pairs() {
        assert!(is_lat_lng(&json!({"lat": 35.6, "lng": 139.7})));
        assert!(!is_lat_lng(&json!({"lat": 35.6})));
        assert!(!is_lat_lng(&json!({"lat": "35.6", "lng": 139.7})));
        assert!(!is_lat_lng(&json!([35.6, 139.7])));
    }

    #[test]
    fn epoch_millis_recovers_legacy_shapes() {
        assert_eq!(epoch_millis(&json!(1000)), Some(1000));
        assert_eq!(epoch_millis(&json!(1000.6)), Some(1001));
        assert_eq!(epoch_millis(&json!("2500")), Some(2500));
        assert_eq!(epoch_millis(&json!("1970-01-01T00:00:01Z")), Some(1000));
        assert_eq!(epoch_millis(&json!(true)), None);
        assert_eq!(epoch_millis(&json!("soon")), None);
    }

    #[test]
    fn whole_numbers_ignore_timestamps() {
        assert_eq!(whole_number(&json!(3)), Some(3));
        assert_eq!(whole_number(&json!(" 4 ")), Some(4));
        assert_eq!(whole_number(&json!("2024-05-01")), None);
    }

    #[test]
    fn render_distinguishes_absent_from_null() {
        assert_eq!(render_value(None), "undefined");
        assert_eq!(render_value(Some(&Value::Null)), "null");
        assert_eq!(render_value(Some(&json!("legacy"))), "\"legacy\"");
        assert_eq!(render_value(Some(&json!(2))), "2");
    }

    #[test]
    fn optional_coercion_tracks_provenance() {
        let absent = coerce_optional(None, epoch_millis);
        assert_eq!(absent, Coerced::kept(None));

        let null = Value::Null;
        assert_eq!(coerce_optional(Some(&null), epoch_millis), Coerced::kept(None));

        let bad = json!({"nested": true});
        assert_eq!(coerce_optional(Some(&bad), epoch_millis), Coerced::defaulted(None));

        let good = json!(5);
        assert_eq!(coerce_optional(Some(&good), epoch_millis), Coerced::kept(Some(5)));
    }

    #[test]
    fn required_coercion_falls_back() {
        let coerced = coerce_required(None, string_like, String::new);
        assert!(coerced.defaulted);
        assert_eq!(coerced.value, "");

        let numeric_id = json!(42);
        let coerced = coerce_required(Some(&numeric_id), string_like, String::new);
        assert_eq!(coerced, Coerced::kept("42".to_string()));
    }
}
