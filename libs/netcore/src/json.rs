//! Safe JSON value algebra for request bodies.
//!
//! [`JsonValue`] is a closed recursive sum type. Values are built through typed
//! constructors (`From` impls, [`JsonValue::number`]) or converted from any
//! `Serialize` value with [`JsonValue::from_serialize`]. Booleans and integers
//! always keep their own variants; fractional numbers stay `Number`.

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error produced when a host value has no JSON representation.
#[derive(Error, Debug)]
pub enum JsonValueError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// A JSON tree.
///
/// Object keys are kept in a `BTreeMap` so serialization is deterministic.
///
/// Round-trip equality through JSON text is numeric: a whole-valued
/// `Number(2.0)` is written as `2.0` and parses back as `Integer(2)`.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Null,
    Array(Vec<JsonValue>),
    Object(BTreeMap<String, JsonValue>),
}

impl JsonValue {
    /// Numeric constructor: whole-valued finite floats that fit in `i64`
    /// collapse to `Integer`, everything else stays `Number`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::float_cmp
    )]
    pub fn number(value: f64) -> Self {
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
        if value.is_finite()
            && value.fract() == 0.0
            && value >= i64::MIN as f64
            && value < i64::MAX as f64
        {
            JsonValue::Integer(value as i64)
        } else {
            JsonValue::Number(value)
        }
    }

    /// Build an object from `(key, value)` pairs; later keys overwrite earlier ones.
    #[must_use]
    pub fn object<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<JsonValue>,
    {
        JsonValue::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Convert any serializable value into a `JsonValue` tree.
    ///
    /// # Errors
    /// Returns `JsonValueError::InvalidValue` if the value cannot be represented
    /// as JSON (e.g. a map with non-string keys, or a non-finite float).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, JsonValueError> {
        let value =
            serde_json::to_value(value).map_err(|e| JsonValueError::InvalidValue(e.to_string()))?;
        Self::try_from(value)
    }

    /// Serialize to compact JSON bytes.
    ///
    /// # Errors
    /// Fails if the tree contains a non-finite `Number`.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl TryFrom<serde_json::Value> for JsonValue {
    type Error = JsonValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            serde_json::Value::Null => JsonValue::Null,
            // Bool is matched on its own variant, never through the numeric path
            serde_json::Value::Bool(b) => JsonValue::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    JsonValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    if n.is_u64() {
                        JsonValue::Number(f)
                    } else {
                        JsonValue::number(f)
                    }
                } else {
                    return Err(JsonValueError::InvalidValue(format!(
                        "unrepresentable number {n}"
                    )));
                }
            }
            serde_json::Value::String(s) => JsonValue::String(s),
            serde_json::Value::Array(items) => JsonValue::Array(
                items
                    .into_iter()
                    .map(JsonValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(k, v)| JsonValue::try_from(v).map(|v| (k, v)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonValue::String(s) => serializer.serialize_str(s),
            JsonValue::Number(n) => {
                if !n.is_finite() {
                    return Err(S::Error::custom(format!(
                        "non-finite number {n} cannot be encoded as JSON"
                    )));
                }
                serializer.serialize_f64(*n)
            }
            JsonValue::Integer(i) => serializer.serialize_i64(*i),
            JsonValue::Boolean(b) => serializer.serialize_bool(*b),
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsonValue::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        JsonValue::Boolean(value)
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        JsonValue::Integer(value)
    }
}

impl From<i32> for JsonValue {
    fn from(value: i32) -> Self {
        JsonValue::Integer(i64::from(value))
    }
}

impl From<u32> for JsonValue {
    fn from(value: u32) -> Self {
        JsonValue::Integer(i64::from(value))
    }
}

impl From<f64> for JsonValue {
    fn from(value: f64) -> Self {
        JsonValue::number(value)
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        JsonValue::String(value.to_owned())
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        JsonValue::String(value)
    }
}

impl<T: Into<JsonValue>> From<Vec<T>> for JsonValue {
    fn from(values: Vec<T>) -> Self {
        JsonValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<JsonValue>> From<Option<T>> for JsonValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(JsonValue::Null, Into::into)
    }
}

impl From<BTreeMap<String, JsonValue>> for JsonValue {
    fn from(map: BTreeMap<String, JsonValue>) -> Self {
        JsonValue::Object(map)
    }
}
