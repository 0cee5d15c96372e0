//! Storage adapter interface.
//!
//! The core never talks to a database itself. It hands column-keyed rows
//! to an [`Adapter`] and consumes the rows the adapter returns.
//!
//! Adapters must be `Send + Sync`; a single adapter is shared by every
//! model of an [`crate::Orm`].

mod query;
mod recording;
mod transaction;

pub use query::{compare_values, Operator, Predicate, QuerySpec};
pub use recording::{AdapterCall, RecordingAdapter, RecordingTransaction};
pub use transaction::{Transaction, TransactionCallback, TransactionEvent, TransactionHandle};

pub(crate) use transaction::ManagedTransaction;

use crate::error::CoreResult;
use async_trait::async_trait;
use rowkit_value::{Value, ValueMap};
use std::fmt;

/// A storage row keyed by column name.
pub type Row = ValueMap;

/// Where an adapter call runs: inside a transaction or on a named
/// connection.
#[derive(Clone)]
pub enum QueryClient {
    /// Run inside this transaction.
    Transaction(TransactionHandle),
    /// Run on this connection.
    Connection(String),
}

impl QueryClient {
    /// The transaction, if this client is one.
    pub fn transaction(&self) -> Option<&TransactionHandle> {
        match self {
            QueryClient::Transaction(trx) => Some(trx),
            QueryClient::Connection(_) => None,
        }
    }

    /// Whether this is a transaction that has already completed.
    pub fn is_completed(&self) -> bool {
        self.transaction().is_some_and(|trx| trx.is_completed())
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryClient::Transaction(trx) => write!(f, "Transaction({})", trx.id()),
            QueryClient::Connection(name) => write!(f, "Connection({name})"),
        }
    }
}

/// Identifies the row a write applies to.
#[derive(Debug, Clone)]
pub struct RowTarget {
    /// Model issuing the write.
    pub model: String,
    /// Table name.
    pub table: String,
    /// Primary key column.
    pub primary_column: String,
    /// Primary key value. For updates and deletes this is the value the
    /// row was loaded with, so a changed key still addresses the old row.
    /// For inserts it is `Undefined` unless the key is self-assigned.
    pub primary_value: Value,
    /// Transaction or connection to run on.
    pub client: Option<QueryClient>,
}

/// A storage backend.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Inserts a row and returns the stored row, including generated
    /// values such as an auto-increment key.
    async fn insert(&self, target: &RowTarget, values: Row) -> CoreResult<Row>;

    /// Updates the target row with `values` and returns the stored row.
    async fn update(&self, target: &RowTarget, values: Row) -> CoreResult<Row>;

    /// Deletes the target row.
    async fn delete(&self, target: &RowTarget) -> CoreResult<()>;

    /// Returns the rows matching a query.
    async fn select(&self, query: &QuerySpec) -> CoreResult<Vec<Row>>;

    /// Counts the rows matching a query. Ordering and window are ignored.
    async fn count(&self, query: &QuerySpec) -> CoreResult<u64>;

    /// Opens a transaction.
    async fn begin_transaction(&self, connection: Option<&str>) -> CoreResult<TransactionHandle>;
}
