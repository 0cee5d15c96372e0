//! Date and date-time parsing.
//!
//! Storage drivers hand date columns back as text more often than not, so
//! consumers of date columns accept RFC 3339 as well as the common
//! `YYYY-MM-DD HH:MM:SS[.fff]` shape (interpreted as UTC).

use crate::error::{ValueError, ValueResult};
use crate::value::Value;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses text into a date-time.
pub fn parse_datetime(input: &str) -> ValueResult<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt);
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(ValueError::invalid_datetime(input))
}

/// Parses text into a calendar date.
///
/// A full date-time is accepted too; its date part is kept.
pub fn parse_date(input: &str) -> ValueResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_datetime(input)
        .map(|dt| dt.date_naive())
        .map_err(|_| ValueError::invalid_date(input))
}

/// Coerces a value into a date-time value.
///
/// Nullish values pass through untouched.
pub fn coerce_datetime(value: Value) -> ValueResult<Value> {
    match value {
        Value::DateTime(_) | Value::Null | Value::Undefined => Ok(value),
        Value::Text(text) => parse_datetime(&text).map(Value::DateTime),
        Value::Date(date) => Ok(Value::DateTime(
            date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset(),
        )),
        other => Err(ValueError::type_mismatch("datetime", other.type_name())),
    }
}

/// Coerces a value into a date value.
///
/// Nullish values pass through untouched.
pub fn coerce_date(value: Value) -> ValueResult<Value> {
    match value {
        Value::Date(_) | Value::Null | Value::Undefined => Ok(value),
        Value::Text(text) => parse_date(&text).map(Value::Date),
        Value::DateTime(dt) => Ok(Value::Date(dt.date_naive())),
        other => Err(ValueError::type_mismatch("date", other.type_name())),
    }
}
