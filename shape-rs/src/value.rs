//! Dynamic value model
//!
//! Every schema operates on [`Value`], an untyped tree that can represent
//! anything an external payload may contain: JSON documents, query-string
//! maps, or values produced by application code. Compared to
//! `serde_json::Value` it distinguishes `undefined` from `null`, keeps
//! non-finite numbers, and carries big integers and dates.
//!
//! # Example
//! ```rust
//! use shape_rs::{Map, Value};
//!
//! let mut map = Map::new();
//! map.insert("name", Value::from("Alice"));
//! map.insert("age", Value::from(42));
//! let value = Value::Object(map);
//!
//! assert_eq!(value.classify(), "Object");
//! assert_eq!(value.to_json().unwrap(), serde_json::json!({"name": "Alice", "age": 42}));
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::path::Path;

/// Shared `undefined` used for absent keys and out-of-range items.
pub(crate) static UNDEFINED: Value = Value::Undefined;

/// An untyped value flowing through schema pipelines.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value (a missing key, or `None` on the output side).
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Floating point number, `NaN` and infinities included.
    Number(f64),
    /// Arbitrary-size integer (bounded to 128 bits).
    BigInt(i128),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Insertion-ordered map of string keys.
    Object(Map),
    /// A point in time, the built-in instance class.
    Date(DateTime<Utc>),
}

impl Value {
    /// Returns the classification label used in "received" positions of
    /// error messages. The label never contains the raw value.
    pub fn classify(&self) -> &'static str {
        match self {
            Self::Undefined => "Option",
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Number(n) if n.is_nan() => "NaN Literal (NaN)",
            Self::Number(_) => "Float",
            Self::BigInt(_) => "BigInt",
            Self::String(_) => "String",
            Self::Array(_) => "Array",
            Self::Object(_) => "Object",
            Self::Date(_) => "Date",
        }
    }

    /// Renders the value the way literal schemas print it.
    ///
    /// Strings are quoted, other primitives are printed as-is, and composite
    /// values fall back to their classification.
    pub fn to_literal_text(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::BigInt(i) => format!("{i}n"),
            Self::String(s) => quote(s),
            _ => self.classify().to_string(),
        }
    }

    /// Exact-value comparison with literal semantics: `NaN` equals `NaN`,
    /// `undefined` and `null` are distinct.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self == other,
        }
    }

    /// Returns `true` for [`Value::Undefined`].
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrows the string if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number if this is a [`Value::Number`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrows the items if this is a [`Value::Array`].
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrows the map if this is a [`Value::Object`].
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key when this is an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Converts a JSON document into a value.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Converts the value into a JSON document.
    ///
    /// `undefined` object entries are dropped. Fails with the location of the
    /// first value JSON cannot represent: a root or array-item `undefined`,
    /// a non-finite number, a big integer, or a date.
    pub fn to_json(&self) -> Result<serde_json::Value, NotJson> {
        match self {
            Self::Null => Ok(serde_json::Value::Null),
            Self::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Self::Number(n) => json_number(*n)
                .map(serde_json::Value::Number)
                .ok_or_else(|| NotJson::at(self)),
            Self::String(s) => Ok(serde_json::Value::String(s.clone())),
            Self::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| item.to_json().map_err(|e| e.within(index.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Self::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, value) in map.iter() {
                    if value.is_undefined() {
                        continue;
                    }
                    out.insert(key.to_string(), value.to_json().map_err(|e| e.within(key))?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Self::Undefined | Self::BigInt(_) | Self::Date(_) => Err(NotJson::at(self)),
        }
    }

    /// Parses JSON text into a value.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Value>(text).map(Self::from_json)
    }
}

/// Location of a value that has no JSON representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotJson {
    /// Where the offending value sits, relative to the converted root.
    pub path: Path,
    /// Classification of the offending value.
    pub received: &'static str,
}

impl NotJson {
    fn at(value: &Value) -> Self {
        Self {
            path: Path::root(),
            received: value.classify(),
        }
    }

    fn within(self, segment: impl Into<String>) -> Self {
        Self {
            path: self.path.prepend(segment),
            received: self.received,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

fn is_exact_integer(n: f64) -> bool {
    const EXACT: f64 = 9_007_199_254_740_991.0;
    n.fract() == 0.0 && n.abs() <= EXACT
}

/// Integral numbers within the exact range are written without a fraction.
fn json_number(n: f64) -> Option<serde_json::Number> {
    if is_exact_integer(n) {
        Some(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        n.to_string()
    }
}

/// JSON-style quoting for strings embedded in messages.
pub(crate) fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

// =============================================================================
// Map
// =============================================================================

/// Insertion-ordered string map.
///
/// Enumeration order is the order keys were first inserted, which is what
/// strict objects rely on to report the first excess key of an input.
/// Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: IndexMap<String, Value>,
}

impl Map {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Insert a value, replacing (in place) and returning any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Check whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(key, value)| (key.into(), value)).collect(),
        }
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(f64::from(n))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, u8, u16, u32, f32);

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Object(map)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Self::Date(date)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Self::Undefined, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) if is_exact_integer(*n) => serializer.serialize_i64(*n as i64),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::BigInt(i) => serializer.serialize_i128(*i),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(date) => {
                serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(None)?;
                for (key, value) in map.iter().filter(|(_, v)| !v.is_undefined()) {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}
