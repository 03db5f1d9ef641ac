//! Temporal normalization.
//!
//! Every string member of an object or array that contains a
//! `YYYY-MM-DDTHH:MM:SS` run is parsed as an instant and, when that succeeds,
//! rewritten as `YYYY-MM-DDTHH:MM:SS.sssZ` in UTC. Unparseable values are left
//! exactly as they were.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static TIMESTAMP_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}")
        .expect("TIMESTAMP_SHAPE is a valid regex pattern")
});

/// A timestamp-shaped string that does not denote an instant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` looks like a timestamp but is not a valid instant")]
pub struct NormalizeError(pub String);

/// Whether `s` contains the `YYYY-MM-DDTHH:MM:SS` shape.
pub fn is_timestamp_shaped(s: &str) -> bool {
    TIMESTAMP_SHAPE.is_match(s)
}

/// Parse `s` as an instant. RFC 3339 with any offset and precision is
/// accepted; an offset-less date-time is read as UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, NormalizeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    s.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|_| NormalizeError(s.to_owned()))
}

/// Canonical text of the instant in `s`: UTC, millisecond precision, `Z`.
pub fn canonical_instant(s: &str) -> Result<String, NormalizeError> {
    parse_instant(s).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Rewrite every timestamp-shaped member of `value` in place.
///
/// Only container members are visited; a bare top-level string is left alone.
pub fn normalize_timestamps(value: &mut Value) {
    match value {
        Value::Object(map) => map.values_mut().for_each(normalize_member),
        Value::Array(items) => items.iter_mut().for_each(normalize_member),
        _ => {}
    }
}

/// Normalized deep copy of `value`; the input is untouched.
pub fn normalized(value: &Value) -> Value {
    let mut copy = value.clone();
    normalize_timestamps(&mut copy);
    copy
}

fn normalize_member(member: &mut Value) {
    match member {
        Value::String(s) if is_timestamp_shaped(s) => match canonical_instant(s) {
            Ok(canonical) => *s = canonical,
            Err(err) => tracing::trace!("left unnormalized: {err}"),
        },
        Value::Object(_) | Value::Array(_) => normalize_timestamps(member),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("2024-01-01T10:00:00+00:00", "2024-01-01T10:00:00.000Z")]
    #[case("2024-01-01T15:30:00+05:30", "2024-01-01T10:00:00.000Z")]
    #[case("2024-01-01T10:00:00.123456Z", "2024-01-01T10:00:00.123Z")]
    #[case("2024-01-01T10:00:00.000Z", "2024-01-01T10:00:00.000Z")]
    #[case("2024-01-01T10:00:00", "2024-01-01T10:00:00.000Z")]
    #[case("2023-12-31T22:00:00-12:00", "2024-01-01T10:00:00.000Z")]
    fn canonical_forms(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(canonical_instant(input).unwrap(), expected);
    }

    #[test]
    fn rewrites_nested_objects_and_arrays() {
        let mut order = json!({
            "updated_at": "2024-01-01T10:00:00+00:00",
            "customer": {"created_at": "2024-01-01T12:00:00+02:00"},
            "refunds": [{"processed_at": "2024-01-01T10:00:00+00:00"}],
            "tags_seen": ["2024-01-01T10:00:00+00:00", "plain"],
        });
        normalize_timestamps(&mut order);
        assert_eq!(
            order,
            json!({
                "updated_at": "2024-01-01T10:00:00.000Z",
                "customer": {"created_at": "2024-01-01T10:00:00.000Z"},
                "refunds": [{"processed_at": "2024-01-01T10:00:00.000Z"}],
                "tags_seen": ["2024-01-01T10:00:00.000Z", "plain"],
            })
        );
    }

    #[test]
    fn unparseable_and_non_timestamp_values_are_untouched() {
        let original = json!({
            "bad": "2024-13-45T99:99:99Z",
            "embedded": "shipped at 2024-01-01T10:00:00 by courier",
            "date_only": "2024-01-01",
            "n": 20240101,
            "b": true,
            "nil": null,
        });
        assert_eq!(normalized(&original), original);
    }

    #[test]
    fn top_level_string_is_not_rewritten() {
        let mut bare = json!("2024-01-01T10:00:00+00:00");
        normalize_timestamps(&mut bare);
        assert_eq!(bare, json!("2024-01-01T10:00:00+00:00"));
    }

    #[test]
    fn normalized_leaves_input_untouched() {
        let raw = json!({"updated_at": "2024-01-01T10:00:00+00:00"});
        let copy = normalized(&raw);
        assert_ne!(copy, raw);
        assert_eq!(raw["updated_at"], "2024-01-01T10:00:00+00:00");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalized(&json!({"a": ["2024-02-29T23:59:59.9999+01:00"]}));
        assert_eq!(normalized(&once), once);
    }

    #[test]
    fn parse_error_names_the_value() {
        let err = parse_instant("2024-02-30T00:00:00Z").unwrap_err();
        assert!(err.to_string().contains("2024-02-30T00:00:00Z"));
    }
}
