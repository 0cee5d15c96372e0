//! Error types for the in-memory adapter.

use rowkit_core::{CoreError, TransactionId};
use thiserror::Error;

/// Result type for in-memory storage operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised by the in-memory adapter.
///
/// They reach model code wrapped in [`CoreError::External`].
#[derive(Debug, Error)]
pub enum MemoryError {
    /// An insert or key change collided with an existing primary key.
    #[error("duplicate primary key in \"{table}\": {key}")]
    DuplicateKey {
        /// Table name.
        table: String,
        /// The colliding key.
        key: String,
    },

    /// A transaction handle from another adapter was passed in.
    #[error("transaction {0} was not opened by this adapter")]
    ForeignTransaction(TransactionId),
}

impl From<MemoryError> for CoreError {
    fn from(err: MemoryError) -> Self {
        CoreError::external(err)
    }
}
