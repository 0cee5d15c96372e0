//! Property-based test generators using proptest.
//!
//! Provides strategies for values, attribute names and payloads that fit
//! the blog schema in [`crate::fixtures`].

use proptest::prelude::*;
use rowkit_core::FieldSelector;
use rowkit_value::{Value, ValueMap};

/// Serialized field names of a `User` that appear in output.
pub const USER_FIELDS: [&str; 7] = [
    "id",
    "username",
    "email",
    "points",
    "createdAt",
    "updatedAt",
    "handle",
];

/// Strategy for scalar values that survive storage unchanged.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9..1.0e9f64).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for values nested up to three levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for camel cased attribute names.
pub fn attribute_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,15}").expect("Invalid regex")
}

/// Strategy for usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{2,11}").expect("Invalid regex")
}

/// Strategy for `User` payloads keyed by attribute name.
pub fn user_payload_strategy() -> impl Strategy<Value = ValueMap> {
    (username_strategy(), any::<u16>(), 0..10_000i64).prop_map(|(username, n, points)| {
        let mut payload = ValueMap::new();
        payload.insert("email".into(), Value::from(format!("{username}{n}@example.com")));
        payload.insert("username".into(), Value::from(username));
        payload.insert("points".into(), Value::Integer(points));
        payload
    })
}

/// Strategy for selectors over [`USER_FIELDS`], returned with the picked
/// and omitted field lists.
pub fn field_selector_strategy(
) -> impl Strategy<Value = (FieldSelector, Option<Vec<String>>, Vec<String>)> {
    let subset = || prop::sample::subsequence(USER_FIELDS.to_vec(), 0..=USER_FIELDS.len());
    (prop::option::of(subset()), subset()).prop_map(|(pick, omit)| {
        let pick: Option<Vec<String>> =
            pick.map(|fields| fields.into_iter().map(str::to_string).collect());
        let omit: Vec<String> = omit.into_iter().map(str::to_string).collect();
        let selector = match &pick {
            Some(fields) => FieldSelector::pick(fields.clone()).and_omit(omit.clone()),
            None => FieldSelector::omit(omit.clone()),
        };
        (selector, pick, omit)
    })
}
