//! Canonical key values and dotted-path field resolution.

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use std::fmt;

/// A scalar that can take part in a physical key.
///
/// Every key value has exactly one canonical string form, and lexicographic
/// order of canonical strings is the order range scans observe.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    /// Text, used verbatim.
    String(String),
    /// `true` or `false`.
    Bool(bool),
    /// Integer or decimal in JSON notation.
    Number(Number),
    /// Instant rendered as `<epoch seconds>.<micros>`.
    Timestamp(DateTime<Utc>),
}

impl KeyValue {
    /// Converts a JSON value, returning `None` for null, arrays and objects.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Timestamp(ts) => {
                format!("{}.{:06}", ts.timestamp(), ts.timestamp_subsec_micros())
            }
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for KeyValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<DateTime<Utc>> for KeyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Walks a dotted path through nested objects.
///
/// A missing key, or an intermediate that is not an object, resolves to
/// `None`.
#[must_use]
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.as_object()?.get(segment))
}

/// Resolves a dotted path to its key value.
///
/// Returns `None` when the field is absent, null, or not a scalar.
#[must_use]
pub fn field_value(document: &Value, path: &str) -> Option<KeyValue> {
    resolve_path(document, path).and_then(KeyValue::from_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn canonical_forms() {
        assert_eq!(KeyValue::from("thriller").canonical(), "thriller");
        assert_eq!(KeyValue::from(true).canonical(), "true");
        assert_eq!(KeyValue::from(false).canonical(), "false");
        assert_eq!(KeyValue::from(42_i64).canonical(), "42");
        assert_eq!(
            KeyValue::from_json(&json!(4.5)).map(|v| v.canonical()),
            Some("4.5".to_string())
        );
    }

    #[test]
    fn timestamp_has_fixed_precision() {
        let ts = Utc.timestamp_opt(1_700_000_000, 5_000).unwrap();
        assert_eq!(KeyValue::from(ts).canonical(), "1700000000.000005");

        let later = Utc.timestamp_opt(1_700_000_000, 120_000_000).unwrap();
        assert!(KeyValue::from(ts).canonical() < KeyValue::from(later).canonical());
    }

    #[test]
    fn non_scalars_are_absent() {
        assert!(KeyValue::from_json(&Value::Null).is_none());
        assert!(KeyValue::from_json(&json!([1, 2])).is_none());
        assert!(KeyValue::from_json(&json!({"a": 1})).is_none());
    }

    #[test]
    fn dotted_paths() {
        let doc = json!({"category": {"name": "thriller", "tags": null}, "title": "x"});
        assert_eq!(
            field_value(&doc, "category.name"),
            Some(KeyValue::from("thriller"))
        );
        assert_eq!(field_value(&doc, "title"), Some(KeyValue::from("x")));
        assert_eq!(field_value(&doc, "category.tags"), None);
        assert_eq!(field_value(&doc, "category.missing"), None);
        assert_eq!(field_value(&doc, "title.inner"), None);
        assert_eq!(field_value(&doc, "author.name"), None);
    }
}
