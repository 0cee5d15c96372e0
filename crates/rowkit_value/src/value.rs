//! Dynamic attribute value type.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Map of attribute (or column) names to values.
pub type ValueMap = BTreeMap<String, Value>;

/// A dynamic attribute value.
///
/// The variant set is closed: scalars, ordered lists, keyed maps and
/// opaque objects with enumerable fields. Every comparison made by the
/// dirty engine goes through [`crate::deep_eq`], which is also what
/// `PartialEq` delegates to.
///
/// `Undefined` and `Null` are distinct. An attribute explicitly set to
/// `Undefined` is still present on the instance (and therefore takes part
/// in dirty tracking) but is dropped from serialized output and from
/// adapter payloads. `Null` is preserved everywhere.
#[derive(Debug, Clone)]
pub enum Value {
    /// Explicitly unset.
    Undefined,
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Date-time with offset. Compared by instant, not by offset.
    DateTime(DateTime<FixedOffset>),
    /// Calendar date.
    Date(NaiveDate),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Keyed map of values.
    Map(ValueMap),
    /// Opaque object with enumerable fields.
    Object(Object),
}

/// An opaque object value: a class name plus enumerable fields.
///
/// Two objects are equal when their class names match and their fields
/// are deeply equal. Anything the fields do not expose is invisible to
/// comparison.
#[derive(Debug, Clone)]
pub struct Object {
    class: String,
    fields: ValueMap,
}

impl Object {
    /// Creates an object with the given class name and no fields.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: ValueMap::new(),
        }
    }

    /// Adds a field, returning the object.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns the enumerable fields.
    pub fn fields(&self) -> &ValueMap {
        &self.fields
    }

    /// Returns the fields mutably.
    pub fn fields_mut(&mut self) -> &mut ValueMap {
        &mut self.fields
    }
}

impl Value {
    /// Creates a list value from anything convertible to values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Creates a map value from key/value pairs.
    pub fn map<I, K, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the current UTC time as a date-time value.
    pub fn now() -> Self {
        Value::DateTime(Utc::now().fixed_offset())
    }

    /// Returns a short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    /// Check if this value is explicitly undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is null or undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a date-time, if it is one.
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Get this value as a date, if it is one.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get this value as an object, if it is one.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Look up a key in a map value or a field in an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            Value::Object(o) => o.fields.get(key),
            _ => None,
        }
    }

    /// Canonical text used when a value has to act as a lookup key.
    ///
    /// Integers and their float equivalents produce the same key, and
    /// date-times are normalized to UTC so that equal instants collide.
    pub fn key_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => (*f as i64).to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::DateTime(dt) => dt.with_timezone(&Utc).to_rfc3339(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            other => other.to_json().to_string(),
        }
    }

    /// [`Value::key_string`] prefixed with the kind of value, for grouping.
    ///
    /// Text `"1"` and the integer `1` share a key string but not a group
    /// key. Integers and integral floats still group together.
    pub fn group_key(&self) -> String {
        let tag = match self {
            Value::Undefined | Value::Null => "z",
            Value::Bool(_) => "b",
            Value::Integer(_) | Value::Float(_) => "n",
            Value::Text(_) => "t",
            Value::Bytes(_) => "x",
            Value::DateTime(_) => "i",
            Value::Date(_) => "d",
            Value::List(_) => "l",
            Value::Map(_) => "m",
            Value::Object(_) => "o",
        };
        format!("{tag}:{}", self.key_string())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::deep_eq(self, other)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && crate::compare::maps_eq(&self.fields, &other.fields)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt.fixed_offset())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<ValueMap> for Value {
    fn from(m: ValueMap) -> Self {
        Value::Map(m)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::Undefined.is_undefined());
        assert!(Value::Undefined.is_nullish());
        assert!(!Value::Bool(false).is_nullish());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_bool(), None);
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Integer(2).as_float(), Some(2.0));
        assert_eq!(Value::Text("hello".into()).as_text(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1, 2][..]));
    }

    #[test]
    fn map_and_object_get() {
        let map = Value::map([("name", "Alice")]);
        assert_eq!(map.get("name"), Some(&Value::from("Alice")));
        assert_eq!(map.get("missing"), None);

        let obj = Value::from(Object::new("Money").with_field("cents", 250));
        assert_eq!(obj.get("cents"), Some(&Value::Integer(250)));
        assert_eq!(obj.as_object().map(Object::class), Some("Money"));
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from("x".to_string()), Value::Text("x".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
        assert_eq!(Value::from(()), Value::Null);
        assert_eq!(
            Value::list([1i64, 2]),
            Value::List(vec![Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn group_keys_keep_text_and_numbers_apart() {
        assert_eq!(Value::Text("1".into()).key_string(), Value::Integer(1).key_string());
        assert_ne!(Value::Text("1".into()).group_key(), Value::Integer(1).group_key());
        assert_eq!(Value::Float(3.0).group_key(), Value::Integer(3).group_key());
        assert_ne!(Value::Text("true".into()).group_key(), Value::Bool(true).group_key());
        assert_eq!(Value::Text("virk".into()).group_key(), "t:virk");
    }

    #[test]
    fn key_string_normalizes_numbers_and_instants() {
        assert_eq!(Value::Integer(3).key_string(), Value::Float(3.0).key_string());

        let utc = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let shifted = utc.with_timezone(&FixedOffset::east_opt(3600).unwrap());
        assert_eq!(
            Value::from(utc).key_string(),
            Value::from(shifted).key_string()
        );
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Undefined.type_name(), "undefined");
        assert_eq!(Value::now().type_name(), "datetime");
        assert_eq!(Value::Map(ValueMap::new()).type_name(), "map");
    }
}
