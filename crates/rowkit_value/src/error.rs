//! Error types for the value crate.

use thiserror::Error;

/// Result type for value conversions.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur while converting or parsing values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Text could not be parsed as a date-time.
    #[error("invalid date-time: {input:?}")]
    InvalidDateTime {
        /// The rejected input.
        input: String,
    },

    /// Text could not be parsed as a calendar date.
    #[error("invalid date: {input:?}")]
    InvalidDate {
        /// The rejected input.
        input: String,
    },

    /// The value has a different variant than the one requested.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the expected variant.
        expected: &'static str,
        /// Name of the variant that was found.
        found: &'static str,
    },

    /// Serde (de)serialization through JSON failed.
    #[error("json conversion failed: {message}")]
    Json {
        /// Description of the failure.
        message: String,
    },
}

impl ValueError {
    /// Creates an invalid date-time error.
    pub fn invalid_datetime(input: impl Into<String>) -> Self {
        Self::InvalidDateTime {
            input: input.into(),
        }
    }

    /// Creates an invalid date error.
    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDate {
            input: input.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}

impl From<serde_json::Error> for ValueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}
