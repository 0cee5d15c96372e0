//! Core type definitions for rowkit.

use std::fmt;

/// Unique identifier for a transaction.
///
/// Transaction IDs are assigned by the adapter and never reused within a
/// process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trx:{}", self.0)
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Whether a relation holds one related instance or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one related instance.
    One,
    /// An ordered collection of related instances.
    Many,
}

impl Cardinality {
    /// Describes the accepted shape, for error messages.
    #[must_use]
    pub const fn expected_shape(self) -> &'static str {
        match self {
            Cardinality::One => "a single instance or null",
            Cardinality::Many => "a list of instances",
        }
    }
}
