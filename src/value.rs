//! Typed values exchanged between mapped objects and the value converter.
//!
//! `TypedValue` is the in-memory side of the conversion pipeline: accessor
//! closures read and write properties through it, and the converter translates
//! it to and from the store's wire representation (`serde_json` values, with
//! `false` as the null sentinel for scalars).

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object::{ErasedCollection, ErasedObj};

/// Store-assigned numeric record identifier.
///
/// Identifiers are allocated by the remote store on create; the client never
/// invents them. A missing identifier (`Option::None`) marks an object as not
/// persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl From<RecordId> for serde_json::Value {
    fn from(id: RecordId) -> Self {
        Self::from(id.0)
    }
}

/// Conversion failure between a `TypedValue` and a concrete Rust type.
///
/// Raised by the `TryFrom` impls used inside property setter closures; the
/// converter wraps it with the offending property and field kind.
#[derive(Debug, Clone, Error)]
#[error("expected {expected} value, got {actual}")]
pub struct ValueTypeError {
    /// The Rust-side shape the setter expected.
    pub expected: &'static str,
    /// The `TypedValue` variant actually supplied.
    pub actual: &'static str,
}

impl ValueTypeError {
    pub(crate) fn new(expected: &'static str, value: &TypedValue) -> Self {
        Self {
            expected,
            actual: value.type_name(),
        }
    }
}

/// In-memory value of a mapped property.
///
/// `Null` is the single representation of "no value"; the converter maps it to
/// the store's `false` sentinel (or omits it) depending on the field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Absent value.
    Null,
    /// Boolean field value.
    Bool(bool),
    /// Integer field value (also carries record identifiers).
    Int(i64),
    /// Float or monetary field value.
    Float(f64),
    /// Char, text, HTML, binary or selection field value.
    Text(String),
    /// Date field value (no time component).
    Date(NaiveDate),
    /// Datetime field value, UTC.
    DateTime(DateTime<Utc>),
    /// Single-valued association: a handle to a managed object.
    Reference(ErasedObj),
    /// Multi-valued association: stored ids plus current member handles.
    Many(ErasedCollection),
    /// Raw wire value for field kinds the converter does not model.
    Json(serde_json::Value),
}

impl TypedValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Reads the value as a record identifier.
    #[must_use]
    pub const fn as_record_id(&self) -> Option<RecordId> {
        match self {
            Self::Int(v) => Some(RecordId::new(*v)),
            _ => None,
        }
    }

    /// Returns a human-readable variant name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Reference(_) => "reference",
            Self::Many(_) => "collection",
            Self::Json(_) => "json",
        }
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        Self::Null
    }
}

// From impls for the plain types accessor getters hand back. Optional values
// collapse `None` onto `Null`.
impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<NaiveDate> for TypedValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<RecordId> for TypedValue {
    fn from(v: RecordId) -> Self {
        Self::Int(v.as_i64())
    }
}

impl From<serde_json::Value> for TypedValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<V> From<Option<V>> for TypedValue
where
    V: Into<TypedValue>,
{
    fn from(v: Option<V>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

macro_rules! try_from_typed {
    ($ty:ty, $expected:literal, $($pattern:pat => $value:expr),+ $(,)?) => {
        impl TryFrom<TypedValue> for Option<$ty> {
            type Error = ValueTypeError;

            fn try_from(value: TypedValue) -> Result<Self, Self::Error> {
                match value {
                    TypedValue::Null => Ok(None),
                    $($pattern => Ok(Some($value)),)+
                    other => Err(ValueTypeError::new($expected, &other)),
                }
            }
        }
    };
}

try_from_typed!(bool, "bool", TypedValue::Bool(v) => v);
try_from_typed!(i64, "int", TypedValue::Int(v) => v);
try_from_typed!(f64, "float", TypedValue::Float(v) => v, TypedValue::Int(v) => v as f64);
try_from_typed!(String, "text", TypedValue::Text(v) => v);
try_from_typed!(NaiveDate, "date", TypedValue::Date(v) => v);
try_from_typed!(DateTime<Utc>, "datetime", TypedValue::DateTime(v) => v);
try_from_typed!(RecordId, "record id", TypedValue::Int(v) => RecordId::new(v));
try_from_typed!(serde_json::Value, "json", TypedValue::Json(v) => v);

/// Helpers for reading loosely-typed wire values.
///
/// The store encodes "no value" as boolean `false` for scalar fields, so every
/// reader here treats `false` and JSON null alike.
pub(crate) mod wire {
    use serde_json::Value;

    use super::RecordId;

    /// True when the wire value is the store's null sentinel.
    pub fn is_absent(value: &Value) -> bool {
        matches!(value, Value::Null | Value::Bool(false))
    }

    pub fn opt_str(value: &Value) -> Option<&str> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn opt_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn opt_bool(value: &Value) -> Option<bool> {
        value.as_bool()
    }

    /// Extracts a record id from a to-one wire value: a bare number or an
    /// `[id, label]` pair. The null sentinel and empty arrays yield `None`.
    pub fn opt_record_id(value: &Value) -> Option<RecordId> {
        let id = match value {
            Value::Array(items) => items.first().and_then(opt_i64),
            other => opt_i64(other),
        }?;
        (id > 0).then(|| RecordId::new(id))
    }

    /// Extracts the id list of a to-many wire value, dropping non-ids.
    pub fn record_ids(value: &Value) -> Vec<RecordId> {
        match value {
            Value::Array(items) => items.iter().filter_map(opt_record_id).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_roundtrip() {
        let id = RecordId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(format!("{id}"), "42");
        assert_eq!(RecordId::from(42), id);
    }

    #[test]
    fn test_optional_from_collapses_none() {
        let none: Option<String> = None;
        assert_eq!(TypedValue::from(none), TypedValue::Null);
        assert_eq!(
            TypedValue::from(Some("hello".to_string())),
            TypedValue::Text("hello".to_string())
        );
    }

    #[test]
    fn test_try_from_null_is_none() {
        let v: Option<i64> = TypedValue::Null.try_into().unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_try_from_mismatch() {
        let err = <Option<i64>>::try_from(TypedValue::Text("x".into())).unwrap_err();
        assert_eq!(err.expected, "int");
        assert_eq!(err.actual, "text");
    }

    #[test]
    fn test_float_accepts_int() {
        let v: Option<f64> = TypedValue::Int(3).try_into().unwrap();
        assert_eq!(v, Some(3.0));
    }

    #[test]
    fn test_wire_record_id_shapes() {
        use serde_json::json;

        assert_eq!(wire::opt_record_id(&json!(7)), Some(RecordId::new(7)));
        assert_eq!(
            wire::opt_record_id(&json!([7, "Seven"])),
            Some(RecordId::new(7))
        );
        assert_eq!(wire::opt_record_id(&json!(false)), None);
        assert_eq!(wire::opt_record_id(&json!([])), None);
        assert_eq!(wire::opt_record_id(&json!(0)), None);
    }

    #[test]
    fn test_wire_record_ids_filters() {
        use serde_json::json;

        assert_eq!(
            wire::record_ids(&json!([1, 2, false, 0, 3])),
            vec![RecordId::new(1), RecordId::new(2), RecordId::new(3)]
        );
        assert!(wire::record_ids(&json!(false)).is_empty());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(TypedValue::Null.type_name(), "null");
        assert_eq!(TypedValue::Bool(true).type_name(), "bool");
        assert_eq!(TypedValue::Int(1).type_name(), "int");
        assert_eq!(TypedValue::Text(String::new()).type_name(), "text");
    }
}
