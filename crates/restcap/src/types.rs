//! Property types: converters between wire JSON and [`PropertyValue`].
//!
//! Every type renders itself (via `Display`) as the descriptor it was built
//! from, so `registry.build(&ty.to_string())` reconstructs an equal type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::SecondsFormat;
use regex::Regex;

use crate::date_format::DateFormat;
use crate::registry::TypeRegistry;
use crate::{Error, PropertyValue, Result};

/// Conversion contract shared by every property type.
pub trait PropertyType: fmt::Debug + fmt::Display + Send + Sync {
    /// Convert an in-memory value to its wire form.
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value>;

    /// Convert a wire value to its in-memory form.
    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue>;
}

/// Shared handle to a built type.
pub type TypeRef = Arc<dyn PropertyType>;

impl PartialEq for dyn PropertyType {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

/// A type that can be recognized from a descriptor string.
///
/// Implementors return `None` when the descriptor is not theirs, letting the
/// registry try the next converter. Composite types build their inner types
/// by calling back into the same registry.
pub trait TypeDescriptor: PropertyType + Sized + 'static {
    fn from_descriptor(descriptor: &str, registry: &TypeRegistry) -> Option<Result<Self>>;
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^date<(.+)>$").expect("date descriptor regex"))
}

fn set_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^set<(.+)>$").expect("set descriptor regex"))
}

fn map_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^map<(.+)>$").expect("map descriptor regex"))
}

// =============================================================================
// Scalars
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringType;

impl fmt::Display for StringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("string")
    }
}

impl PropertyType for StringType {
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
        let s = match value {
            PropertyValue::Null => String::new(),
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Date(d) => d.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            PropertyValue::Set(_) | PropertyValue::Map(_) => value.to_json().to_string(),
        };
        Ok(serde_json::Value::String(s))
    }

    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
        match value {
            serde_json::Value::String(s) => Ok(PropertyValue::String(s.clone())),
            serde_json::Value::Number(n) => Ok(PropertyValue::String(n.to_string())),
            serde_json::Value::Bool(b) => Ok(PropertyValue::String(b.to_string())),
            other => Err(Error::denormalization(self, format!("expected a string, got {other}"))),
        }
    }
}

impl TypeDescriptor for StringType {
    fn from_descriptor(descriptor: &str, _: &TypeRegistry) -> Option<Result<Self>> {
        (descriptor == "string").then_some(Ok(Self))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntType;

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("int")
    }
}

impl PropertyType for IntType {
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
        let i = match value {
            PropertyValue::Int(i) => *i,
            PropertyValue::Float(f) => *f as i64,
            PropertyValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                    .unwrap_or(0)
            }
            PropertyValue::Date(d) => d.timestamp(),
            other => i64::from(other.is_truthy()),
        };
        Ok(serde_json::Value::from(i))
    }

    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
        let parsed = match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed
            .map(PropertyValue::Int)
            .ok_or_else(|| Error::denormalization(self, format!("expected an integer, got {value}")))
    }
}

impl TypeDescriptor for IntType {
    fn from_descriptor(descriptor: &str, _: &TypeRegistry) -> Option<Result<Self>> {
        (descriptor == "int").then_some(Ok(Self))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloatType;

impl fmt::Display for FloatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("float")
    }
}

impl PropertyType for FloatType {
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
        let f = match value {
            PropertyValue::Float(f) => *f,
            PropertyValue::Int(i) => *i as f64,
            PropertyValue::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            PropertyValue::Date(d) => d.timestamp() as f64,
            other => f64::from(u8::from(other.is_truthy())),
        };
        // NaN and infinities have no JSON form
        let f = if f.is_finite() { f } else { 0.0 };
        Ok(serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::from(0)))
    }

    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
        let parsed = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .map(PropertyValue::Float)
            .ok_or_else(|| Error::denormalization(self, format!("expected a number, got {value}")))
    }
}

impl TypeDescriptor for FloatType {
    fn from_descriptor(descriptor: &str, _: &TypeRegistry) -> Option<Result<Self>> {
        (descriptor == "float").then_some(Ok(Self))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolType;

impl fmt::Display for BoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bool")
    }
}

impl PropertyType for BoolType {
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Bool(value.is_truthy()))
    }

    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
        let parsed = match value {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            serde_json::Value::String(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        parsed
            .map(PropertyValue::Bool)
            .ok_or_else(|| Error::denormalization(self, format!("expected a boolean, got {value}")))
    }
}

impl TypeDescriptor for BoolType {
    fn from_descriptor(descriptor: &str, _: &TypeRegistry) -> Option<Result<Self>> {
        (descriptor == "bool").then_some(Ok(Self))
    }
}

// =============================================================================
// Dates
// =============================================================================

/// A date rendered with a fixed pattern, e.g. `date<Y-m-d>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateType {
    format: DateFormat,
}

impl DateType {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            format: DateFormat::new(pattern),
        }
    }

    pub fn format(&self) -> &DateFormat {
        &self.format
    }
}

impl fmt::Display for DateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "date<{}>", self.format)
    }
}

impl PropertyType for DateType {
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
        let date = match value {
            PropertyValue::Date(d) => *d,
            PropertyValue::String(s) => self
                .format
                .parse(s)
                .map_err(|message| Error::normalization(self, message))?,
            other => {
                return Err(Error::normalization(
                    self,
                    format!("expected a date, got {}", other.kind()),
                ));
            }
        };
        Ok(serde_json::Value::String(self.format.format(&date)))
    }

    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
        let serde_json::Value::String(s) = value else {
            return Err(Error::denormalization(self, format!("expected a date string, got {value}")));
        };
        self.format
            .parse(s)
            .map(PropertyValue::Date)
            .map_err(|message| Error::denormalization(self, message))
    }
}

impl TypeDescriptor for DateType {
    fn from_descriptor(descriptor: &str, _: &TypeRegistry) -> Option<Result<Self>> {
        let captures = date_regex().captures(descriptor)?;
        Some(Ok(Self::new(&captures[1])))
    }
}

// =============================================================================
// Composites
// =============================================================================

/// An unordered collection of distinct values of one inner type.
#[derive(Debug, Clone)]
pub struct SetType {
    inner: TypeRef,
}

impl SetType {
    pub fn new(inner: TypeRef) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &TypeRef {
        &self.inner
    }
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set<{}>", self.inner)
    }
}

impl PropertyType for SetType {
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
        let PropertyValue::Set(items) = value else {
            return Err(Error::normalization(
                self,
                format!("expected a set, got {}", value.kind()),
            ));
        };

        let mut out: Vec<serde_json::Value> = Vec::with_capacity(items.len());
        for item in items {
            let wire = self.inner.normalize(item)?;
            if !out.contains(&wire) {
                out.push(wire);
            }
        }
        Ok(serde_json::Value::Array(out))
    }

    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
        let serde_json::Value::Array(items) = value else {
            return Err(Error::denormalization(self, format!("expected an array, got {value}")));
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let value = self.inner.denormalize(item)?;
            if !out.contains(&value) {
                out.push(value);
            }
        }
        Ok(PropertyValue::Set(out))
    }
}

impl TypeDescriptor for SetType {
    fn from_descriptor(descriptor: &str, registry: &TypeRegistry) -> Option<Result<Self>> {
        let captures = set_regex().captures(descriptor)?;
        Some(registry.build(&captures[1]).map(Self::new))
    }
}

/// A keyed collection, e.g. `map<string, date<c>>`.
#[derive(Debug, Clone)]
pub struct MapType {
    key: TypeRef,
    value: TypeRef,
}

impl MapType {
    pub fn new(key: TypeRef, value: TypeRef) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &TypeRef {
        &self.key
    }

    pub fn value(&self) -> &TypeRef {
        &self.value
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map<{}, {}>", self.key, self.value)
    }
}

impl PropertyType for MapType {
    fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
        let PropertyValue::Map(entries) = value else {
            return Err(Error::normalization(
                self,
                format!("expected a map, got {}", value.kind()),
            ));
        };

        let mut out = serde_json::Map::with_capacity(entries.len());
        for (key, value) in entries {
            let wire_key = self.key.normalize(&PropertyValue::String(key.clone()))?;
            out.insert(json_key(&wire_key), self.value.normalize(value)?);
        }
        Ok(serde_json::Value::Object(out))
    }

    fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
        let serde_json::Value::Object(entries) = value else {
            return Err(Error::denormalization(self, format!("expected an object, got {value}")));
        };

        let mut out = BTreeMap::new();
        for (key, value) in entries {
            // keys are held in their normalized wire form
            let key = self.key.denormalize(&serde_json::Value::String(key.clone()))?;
            out.insert(json_key(&self.key.normalize(&key)?), self.value.denormalize(value)?);
        }
        Ok(PropertyValue::Map(out))
    }
}

impl TypeDescriptor for MapType {
    fn from_descriptor(descriptor: &str, registry: &TypeRegistry) -> Option<Result<Self>> {
        let captures = map_regex().captures(descriptor)?;
        let (key, value) = split_top_level(&captures[1])?;
        let build = || -> Result<Self> {
            Ok(Self::new(registry.build(key)?, registry.build(value)?))
        };
        Some(build())
    }
}

/// Split `key, value` at the first comma outside angle brackets.
fn split_top_level(inner: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((inner[..i].trim(), inner[i + 1..].trim())),
            _ => {}
        }
    }
    None
}

fn json_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scalar_types() -> Vec<TypeRef> {
        vec![
            Arc::new(StringType),
            Arc::new(IntType),
            Arc::new(FloatType),
            Arc::new(BoolType),
        ]
    }

    #[test]
    fn test_scalar_normalize_is_total() {
        let inputs = vec![
            PropertyValue::Int(1),
            PropertyValue::Float(1.2),
            PropertyValue::Bool(true),
            PropertyValue::String(String::new()),
            PropertyValue::Set(vec![]),
            PropertyValue::from(json!({"a": 1})),
            PropertyValue::Null,
            PropertyValue::Float(f64::NAN),
            PropertyValue::Float(f64::INFINITY),
        ];
        for ty in scalar_types() {
            for input in &inputs {
                assert!(
                    ty.normalize(input).is_ok(),
                    "{ty} failed to normalize {input:?}"
                );
            }
        }
    }

    #[test]
    fn test_scalar_coercions() {
        assert_eq!(StringType.normalize(&PropertyValue::Int(42)).unwrap(), json!("42"));
        assert_eq!(IntType.normalize(&PropertyValue::from("12")).unwrap(), json!(12));
        assert_eq!(IntType.normalize(&PropertyValue::Float(1.9)).unwrap(), json!(1));
        assert_eq!(IntType.normalize(&PropertyValue::from("abc")).unwrap(), json!(0));
        assert_eq!(FloatType.normalize(&PropertyValue::Int(2)).unwrap(), json!(2.0));
        assert_eq!(FloatType.normalize(&PropertyValue::Float(f64::NAN)).unwrap(), json!(0.0));
        assert_eq!(FloatType.normalize(&PropertyValue::from("-inf")).unwrap(), json!(0.0));
        assert_eq!(BoolType.normalize(&PropertyValue::from("")).unwrap(), json!(false));
        assert_eq!(BoolType.normalize(&PropertyValue::Int(3)).unwrap(), json!(true));
    }

    #[test]
    fn test_scalar_denormalize() {
        assert_eq!(IntType.denormalize(&json!(7)).unwrap(), PropertyValue::Int(7));
        assert_eq!(IntType.denormalize(&json!("7")).unwrap(), PropertyValue::Int(7));
        assert!(IntType.denormalize(&json!(7.5)).is_err());
        assert!(IntType.denormalize(&json!([])).is_err());
        assert_eq!(FloatType.denormalize(&json!(1.5)).unwrap(), PropertyValue::Float(1.5));
        assert_eq!(BoolType.denormalize(&json!(false)).unwrap(), PropertyValue::Bool(false));
        assert!(BoolType.denormalize(&json!("maybe")).is_err());
        assert!(StringType.denormalize(&json!({})).is_err());
    }

    #[test]
    fn test_date_round_trip_through_format() {
        let ty = DateType::new("Y-m-d");
        let value = ty.denormalize(&json!("2016-01-30")).unwrap();
        let date = value.as_date().unwrap();
        assert_eq!(ty.format().format(date), "2016-01-30");
        assert_eq!(ty.normalize(&value).unwrap(), json!("2016-01-30"));
    }

    #[test]
    fn test_date_rejects_malformed() {
        let ty = DateType::new("Y-m-d");
        let err = ty.denormalize(&json!("not-a-date")).unwrap_err();
        assert!(matches!(err, Error::Denormalization { .. }));
        assert!(matches!(
            ty.normalize(&PropertyValue::Int(3)).unwrap_err(),
            Error::Normalization { .. }
        ));
    }

    #[test]
    fn test_date_normalizes_matching_strings() {
        let ty = DateType::new("d/m/Y");
        assert_eq!(ty.normalize(&PropertyValue::from("30/01/2016")).unwrap(), json!("30/01/2016"));
        assert!(ty.normalize(&PropertyValue::from("2016-01-30")).is_err());
    }

    #[test]
    fn test_set_deduplicates() {
        let ty = SetType::new(Arc::new(IntType));
        let wire = ty
            .normalize(&PropertyValue::Set(vec![
                PropertyValue::Int(1),
                PropertyValue::from("1"),
                PropertyValue::Int(2),
            ]))
            .unwrap();
        assert_eq!(wire, json!([1, 2]));

        let value = ty.denormalize(&json!([3, 3, 4])).unwrap();
        assert_eq!(value, PropertyValue::Set(vec![PropertyValue::Int(3), PropertyValue::Int(4)]));
        assert!(ty.normalize(&PropertyValue::Int(1)).is_err());
    }

    #[test]
    fn test_map_converts_keys_and_values() {
        let ty = MapType::new(Arc::new(IntType), Arc::new(DateType::new("Y-m-d")));
        let value = ty.denormalize(&json!({"1": "2016-01-30"})).unwrap();
        let PropertyValue::Map(entries) = &value else {
            panic!("expected map");
        };
        assert!(entries.contains_key("1"));
        assert_eq!(ty.normalize(&value).unwrap(), json!({"1": "2016-01-30"}));
        assert!(ty.denormalize(&json!({"x": "2016-01-30"})).is_err());
    }

    #[test]
    fn test_map_with_date_keys_writes_back() {
        let registry = TypeRegistry::defaults();
        let ty = registry.build("map<date<Y-m-d>, int>").unwrap();
        let value = ty.denormalize(&json!({"2016-01-30": 1})).unwrap();
        let PropertyValue::Map(entries) = &value else {
            panic!("expected map");
        };
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["2016-01-30"]);
        assert_eq!(ty.normalize(&value).unwrap(), json!({"2016-01-30": 1}));
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(DateType::new("Y-m-d").to_string(), "date<Y-m-d>");
        assert_eq!(SetType::new(Arc::new(IntType)).to_string(), "set<int>");
        assert_eq!(
            MapType::new(Arc::new(StringType), Arc::new(DateType::new("c"))).to_string(),
            "map<string, date<c>>"
        );
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(split_top_level("string, int"), Some(("string", "int")));
        assert_eq!(
            split_top_level("map<string, int>, set<date<c>>"),
            Some(("map<string, int>", "set<date<c>>"))
        );
        assert_eq!(split_top_level("string"), None);
    }
}
