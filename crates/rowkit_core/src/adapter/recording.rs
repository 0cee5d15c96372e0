//! Recording adapter for testing.
//!
//! Keeps rows in per-table vectors and records every call it receives.
//! Transactions are bookkeeping only: writes apply immediately and a
//! rollback does not undo them. Use `rowkit_memory` when isolation or row
//! locking matters.

use super::{
    Adapter, QuerySpec, Row, RowTarget, Transaction, TransactionCallback, TransactionEvent,
    TransactionHandle,
};
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use async_trait::async_trait;
use parking_lot::Mutex;
use rowkit_value::{deep_eq, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// A call received by a [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    /// `insert` into a table.
    Insert {
        /// Table name.
        table: String,
        /// Values handed to the adapter.
        values: Row,
    },
    /// `update` of a row.
    Update {
        /// Table name.
        table: String,
        /// Primary key value addressing the row.
        key: Value,
        /// Values handed to the adapter.
        values: Row,
    },
    /// `delete` of a row.
    Delete {
        /// Table name.
        table: String,
        /// Primary key value addressing the row.
        key: Value,
    },
    /// `select` from a table.
    Select {
        /// Table name.
        table: String,
    },
    /// `count` over a table.
    Count {
        /// Table name.
        table: String,
    },
    /// `begin_transaction`.
    Begin,
}

/// An adapter that records calls and stores rows in memory.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    calls: Mutex<Vec<AdapterCall>>,
    failure: Mutex<Option<String>>,
    next_key: AtomicI64,
    next_trx: AtomicU64,
}

impl RecordingAdapter {
    /// Creates an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row to a table without recording a call.
    pub fn seed(&self, table: &str, row: Row) {
        self.tables.lock().entry(table.to_string()).or_default().push(row);
    }

    /// Rows currently stored in a table.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of recorded inserts.
    pub fn insert_count(&self) -> usize {
        self.count_calls(|call| matches!(call, AdapterCall::Insert { .. }))
    }

    /// Number of recorded updates.
    pub fn update_count(&self) -> usize {
        self.count_calls(|call| matches!(call, AdapterCall::Update { .. }))
    }

    /// Number of recorded writes of any kind.
    pub fn write_count(&self) -> usize {
        self.count_calls(|call| {
            matches!(
                call,
                AdapterCall::Insert { .. } | AdapterCall::Update { .. } | AdapterCall::Delete { .. }
            )
        })
    }

    /// Makes the next call fail with an adapter error.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    fn count_calls(&self, predicate: impl Fn(&AdapterCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: AdapterCall) -> CoreResult<()> {
        self.calls.lock().push(call);
        match self.failure.lock().take() {
            Some(message) => Err(CoreError::adapter(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    async fn insert(&self, target: &RowTarget, mut values: Row) -> CoreResult<Row> {
        self.record(AdapterCall::Insert {
            table: target.table.clone(),
            values: values.clone(),
        })?;
        let column = &target.primary_column;
        let mut tables = self.tables.lock();
        let rows = tables.entry(target.table.clone()).or_default();
        // seeded rows may already hold integer keys
        let highest = rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_integer))
            .max()
            .unwrap_or(0);
        self.next_key.fetch_max(highest, Ordering::SeqCst);

        let key = match values.get(column) {
            Some(value) if !value.is_nullish() => value.clone(),
            _ => {
                let key = Value::Integer(self.next_key.fetch_add(1, Ordering::SeqCst) + 1);
                values.insert(column.clone(), key.clone());
                key
            }
        };
        if rows
            .iter()
            .any(|row| row.get(column).is_some_and(|stored| deep_eq(stored, &key)))
        {
            return Err(CoreError::adapter(format!(
                "duplicate key {} in \"{}\"",
                key.key_string(),
                target.table
            )));
        }
        if let Some(explicit) = key.as_integer() {
            self.next_key.fetch_max(explicit, Ordering::SeqCst);
        }
        rows.push(values.clone());
        Ok(values)
    }

    async fn update(&self, target: &RowTarget, values: Row) -> CoreResult<Row> {
        self.record(AdapterCall::Update {
            table: target.table.clone(),
            key: target.primary_value.clone(),
            values: values.clone(),
        })?;
        let mut tables = self.tables.lock();
        let row = tables
            .get_mut(&target.table)
            .and_then(|rows| {
                rows.iter_mut().find(|row| {
                    row.get(&target.primary_column)
                        .is_some_and(|key| deep_eq(key, &target.primary_value))
                })
            })
            .ok_or_else(|| {
                CoreError::row_not_found(
                    &target.table,
                    &target.primary_column,
                    target.primary_value.key_string(),
                )
            })?;
        row.extend(values);
        Ok(row.clone())
    }

    async fn delete(&self, target: &RowTarget) -> CoreResult<()> {
        self.record(AdapterCall::Delete {
            table: target.table.clone(),
            key: target.primary_value.clone(),
        })?;
        if let Some(rows) = self.tables.lock().get_mut(&target.table) {
            rows.retain(|row| {
                !row.get(&target.primary_column)
                    .is_some_and(|key| deep_eq(key, &target.primary_value))
            });
        }
        Ok(())
    }

    async fn select(&self, query: &QuerySpec) -> CoreResult<Vec<Row>> {
        self.record(AdapterCall::Select {
            table: query.table.clone(),
        })?;
        Ok(query.apply(self.rows(&query.table)))
    }

    async fn count(&self, query: &QuerySpec) -> CoreResult<u64> {
        self.record(AdapterCall::Count {
            table: query.table.clone(),
        })?;
        let matched = self
            .rows(&query.table)
            .iter()
            .filter(|row| query.matches(row))
            .count();
        Ok(matched as u64)
    }

    async fn begin_transaction(&self, connection: Option<&str>) -> CoreResult<TransactionHandle> {
        self.record(AdapterCall::Begin)?;
        let id = TransactionId::new(self.next_trx.fetch_add(1, Ordering::SeqCst) + 1);
        Ok(Arc::new(RecordingTransaction::new(
            id,
            connection.map(str::to_string),
        )))
    }
}

/// Transaction handed out by [`RecordingAdapter`].
#[derive(Default)]
pub struct RecordingTransaction {
    id: TransactionId,
    connection: Option<String>,
    completed: AtomicBool,
    committed: AtomicBool,
    listeners: Mutex<Vec<(TransactionEvent, TransactionCallback)>>,
}

impl RecordingTransaction {
    /// Creates an open transaction.
    pub fn new(id: TransactionId, connection: Option<String>) -> Self {
        Self {
            id,
            connection,
            ..Self::default()
        }
    }

    /// Whether the transaction committed.
    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    fn complete(&self, event: TransactionEvent) -> CoreResult<()> {
        if self.completed.swap(true, Ordering::SeqCst) {
            return Err(CoreError::TransactionCompleted { id: self.id.0 });
        }
        self.committed
            .store(event == TransactionEvent::Commit, Ordering::SeqCst);
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for (registered, callback) in listeners {
            if registered == event {
                callback();
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RecordingTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingTransaction")
            .field("id", &self.id)
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transaction for RecordingTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    fn on(&self, event: TransactionEvent, callback: TransactionCallback) {
        self.listeners.lock().push((event, callback));
    }

    async fn commit(&self) -> CoreResult<()> {
        self.complete(TransactionEvent::Commit)
    }

    async fn rollback(&self) -> CoreResult<()> {
        self.complete(TransactionEvent::Rollback)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
