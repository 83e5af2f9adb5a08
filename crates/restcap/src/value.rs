//! In-memory values carried by resource properties.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};

/// A typed property value.
///
/// Values produced by denormalization are already shaped by the property
/// type (dates are parsed, sets deduplicated). Values built by callers may be
/// looser: the type's `normalize` coerces them on the way out.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<FixedOffset>),
    Set(Vec<PropertyValue>),
    /// Keys are held in their normalized string form.
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Loose truthiness, used when coercing to booleans.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty() && s != "0",
            Self::Date(_) => true,
            Self::Set(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    /// Render the value as untyped JSON for display or re-submission.
    ///
    /// Dates are rendered as RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Set(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Set(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<FixedOffset>> for PropertyValue {
    fn from(d: DateTime<FixedOffset>) -> Self {
        Self::Date(d)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value = PropertyValue::from(json!({"a": [1, 2.5, "x"], "b": null, "c": true}));
        let PropertyValue::Map(entries) = value else {
            panic!("expected a map");
        };
        assert_eq!(
            entries["a"],
            PropertyValue::Set(vec![
                PropertyValue::Int(1),
                PropertyValue::Float(2.5),
                PropertyValue::String("x".into()),
            ])
        );
        assert_eq!(entries["b"], PropertyValue::Null);
        assert_eq!(entries["c"], PropertyValue::Bool(true));
    }

    #[test]
    fn test_to_json_renders_dates() {
        let date = DateTime::parse_from_rfc3339("2016-01-30T10:00:00+01:00").unwrap();
        assert_eq!(
            PropertyValue::Date(date).to_json(),
            json!("2016-01-30T10:00:00+01:00")
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!PropertyValue::String("0".into()).is_truthy());
        assert!(!PropertyValue::String(String::new()).is_truthy());
        assert!(PropertyValue::String("no".into()).is_truthy());
        assert!(!PropertyValue::Set(vec![]).is_truthy());
        assert!(PropertyValue::Float(0.1).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::from("abc").to_string(), "abc");
        assert_eq!(PropertyValue::Int(3).to_string(), "3");
    }
}
