//! Conversion between [`Value`] and plain JSON data.

use crate::error::ValueResult;
use crate::value::{Value, ValueMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number};

impl Value {
    /// Converts this value into plain JSON.
    ///
    /// `Undefined` becomes `null` here; callers that need to drop undefined
    /// entries (the serializer does) filter them before converting.
    /// Date-times become RFC 3339 strings, dates `YYYY-MM-DD`, byte strings
    /// arrays of numbers, and non-finite floats `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|byte| (*byte).into()).collect())
            }
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(map_to_json(map)),
            Value::Object(obj) => serde_json::Value::Object(map_to_json(obj.fields())),
        }
    }

    /// Builds a value from plain JSON.
    ///
    /// Numbers that fit an `i64` become integers, everything else floats.
    /// Strings stay text; date columns coerce them on their own.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Deserializes this value into a typed structure.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> ValueResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

/// Converts a value map into a JSON object, dropping undefined entries.
pub fn map_to_json(map: &ValueMap) -> Map<String, serde_json::Value> {
    map.iter()
        .filter(|(_, v)| !v.is_undefined())
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from_json)
    }
}
