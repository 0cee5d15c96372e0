//! # rowkit Value
//!
//! Dynamic attribute values for rowkit models.
//!
//! This crate provides:
//! - [`Value`], the closed set of attribute value shapes (scalars, lists,
//!   maps, opaque objects, dates)
//! - [`deep_eq`], the structural comparison used for dirty tracking
//! - conversion to and from plain JSON data
//! - date and date-time parsing for temporal columns
//!
//! ## Usage
//!
//! ```
//! use rowkit_value::{values, Value};
//!
//! let attrs = values! { "username" => "virk", "points" => 10 };
//! assert_eq!(attrs["username"], Value::from("virk"));
//! assert_eq!(attrs["points"].as_integer(), Some(10));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compare;
mod error;
mod json;
mod temporal;
mod value;

pub use compare::deep_eq;
pub use error::{ValueError, ValueResult};
pub use json::map_to_json;
pub use temporal::{coerce_date, coerce_datetime, parse_date, parse_datetime};
pub use value::{Object, Value, ValueMap};

/// Builds a [`ValueMap`] from `key => value` pairs.
///
/// Keys are anything convertible to `String`, values anything convertible
/// to [`Value`].
#[macro_export]
macro_rules! values {
    () => {
        $crate::ValueMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ValueMap::new();
        $(
            map.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        map
    }};
}
