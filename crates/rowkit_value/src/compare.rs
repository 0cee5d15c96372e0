//! Deep structural equality.
//!
//! This is the comparison the dirty engine relies on. It is structural, not
//! identity based: two lists are equal when their elements are pairwise
//! equal, two maps when they have the same keys with equal values, and two
//! objects when their class names and enumerable fields match.
//!
//! A few semantic rules apply on top of the structural walk:
//! - date-times compare by instant, so the same moment expressed in two
//!   offsets is equal
//! - an integer equals a float holding the same number
//! - `NaN` equals `NaN`, so an unchanged `NaN` attribute is not dirty
//! - `Undefined` only equals `Undefined` and `Null` only equals `Null`
//!
//! Opaque objects are compared through their enumerable fields only. State
//! an object keeps outside those fields cannot be observed here, which makes
//! diffing of arbitrary user objects best-effort.

use crate::value::{Value, ValueMap};

/// Returns true when `a` and `b` are deeply, structurally equal.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => floats_eq(*x, *y),
        #[allow(clippy::cast_precision_loss)]
        (Value::Integer(x), Value::Float(y)) | (Value::Float(y), Value::Integer(x)) => {
            floats_eq(*x as f64, *y)
        }
        (Value::Text(x), Value::Text(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::DateTime(x), Value::DateTime(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| deep_eq(l, r))
        }
        (Value::Map(x), Value::Map(y)) => maps_eq(x, y),
        (Value::Object(x), Value::Object(y)) => {
            x.class() == y.class() && maps_eq(x.fields(), y.fields())
        }
        _ => false,
    }
}

/// Compares two maps key by key.
pub(crate) fn maps_eq(a: &ValueMap, b: &ValueMap) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| deep_eq(value, other)))
}

fn floats_eq(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;
    use chrono::{FixedOffset, TimeZone, Utc};
    use proptest::prelude::*;

    #[test]
    fn scalars() {
        assert!(deep_eq(&Value::Integer(1), &Value::Integer(1)));
        assert!(!deep_eq(&Value::Integer(1), &Value::Integer(2)));
        assert!(deep_eq(&Value::Integer(1), &Value::Float(1.0)));
        assert!(deep_eq(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
        assert!(!deep_eq(&Value::Text("1".into()), &Value::Integer(1)));
    }

    #[test]
    fn null_and_undefined_are_distinct() {
        assert!(!deep_eq(&Value::Null, &Value::Undefined));
        assert!(deep_eq(&Value::Undefined, &Value::Undefined));
        assert!(!deep_eq(&Value::Null, &Value::Bool(false)));
    }

    #[test]
    fn datetimes_compare_by_instant() {
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let plus_two = utc.with_timezone(&FixedOffset::east_opt(7200).unwrap());
        assert!(deep_eq(&Value::from(utc), &Value::from(plus_two)));

        let later = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).unwrap();
        assert!(!deep_eq(&Value::from(utc), &Value::from(later)));
    }

    #[test]
    fn nested_structures() {
        let a = Value::map([
            ("tags", Value::list(["a", "b"])),
            ("meta", Value::map([("depth", 2i64)])),
        ]);
        let mut b = a.clone();
        assert!(deep_eq(&a, &b));

        if let Value::Map(m) = &mut b {
            m.insert("tags".into(), Value::list(["a", "c"]));
        }
        assert!(!deep_eq(&a, &b));
    }

    #[test]
    fn map_key_sets_must_match() {
        let a = Value::map([("x", Value::Undefined)]);
        let b = Value::Map(ValueMap::new());
        assert!(!deep_eq(&a, &b));
    }

    #[test]
    fn objects_compare_class_and_fields() {
        let a = Value::from(Object::new("Point").with_field("x", 1).with_field("y", 2));
        let b = Value::from(Object::new("Point").with_field("x", 1).with_field("y", 2));
        let c = Value::from(Object::new("Vector").with_field("x", 1).with_field("y", 2));
        assert!(deep_eq(&a, &b));
        assert!(!deep_eq(&a, &c));
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(Value::Undefined),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            "[a-z]{0,8}".prop_map(Value::Text),
        ]
    }

    fn nested() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn deep_eq_is_reflexive(v in nested()) {
            prop_assert!(deep_eq(&v, &v.clone()));
        }

        #[test]
        fn deep_eq_is_symmetric(a in nested(), b in nested()) {
            prop_assert_eq!(deep_eq(&a, &b), deep_eq(&b, &a));
        }
    }
}
