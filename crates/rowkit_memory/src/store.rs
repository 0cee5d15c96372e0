//! Table storage and the row lock table.

use crate::error::{MemoryError, MemoryResult};
use parking_lot::Mutex;
use rowkit_core::Row;
use rowkit_value::{deep_eq, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Identifies a locked row: table name and the key's group key.
pub(crate) type LockKey = (String, String);

pub(crate) fn lock_key(table: &str, key: &Value) -> LockKey {
    (table.to_string(), key.group_key())
}

#[derive(Debug, Default)]
pub(crate) struct Table {
    rows: Vec<Row>,
    last_auto: i64,
}

impl Table {
    pub(crate) fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn position(&self, primary_column: &str, key: &Value) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.get(primary_column)
                .is_some_and(|value| deep_eq(value, key))
        })
    }

    #[cfg(test)]
    pub(crate) fn get(&self, primary_column: &str, key: &Value) -> Option<&Row> {
        self.position(primary_column, key).map(|index| &self.rows[index])
    }

    /// Stores a row, assigning an auto-increment key when it has none.
    pub(crate) fn insert(
        &mut self,
        table: &str,
        primary_column: &str,
        mut row: Row,
    ) -> MemoryResult<Row> {
        let key = match row.get(primary_column) {
            Some(value) if !value.is_nullish() => value.clone(),
            _ => {
                self.last_auto += 1;
                let key = Value::Integer(self.last_auto);
                row.insert(primary_column.to_string(), key.clone());
                key
            }
        };
        if self.position(primary_column, &key).is_some() {
            return Err(MemoryError::DuplicateKey {
                table: table.to_string(),
                key: key.key_string(),
            });
        }
        if let Some(n) = key.as_integer() {
            self.last_auto = self.last_auto.max(n);
        }
        self.rows.push(row.clone());
        Ok(row)
    }

    /// Merges `values` into the row at `key`. Returns the previous and the
    /// new row.
    pub(crate) fn update(
        &mut self,
        table: &str,
        primary_column: &str,
        key: &Value,
        values: Row,
    ) -> MemoryResult<Option<(Row, Row)>> {
        let Some(index) = self.position(primary_column, key) else {
            return Ok(None);
        };
        if let Some(next) = values.get(primary_column) {
            let collides = self
                .position(primary_column, next)
                .is_some_and(|other| other != index);
            if collides {
                return Err(MemoryError::DuplicateKey {
                    table: table.to_string(),
                    key: next.key_string(),
                });
            }
        }
        let previous = self.rows[index].clone();
        self.rows[index].extend(values);
        Ok(Some((previous, self.rows[index].clone())))
    }

    /// Removes the row at `key`. Returns its position and contents.
    pub(crate) fn delete(&mut self, primary_column: &str, key: &Value) -> Option<(usize, Row)> {
        let index = self.position(primary_column, key)?;
        Some((index, self.rows.remove(index)))
    }

    pub(crate) fn replace(&mut self, primary_column: &str, key: &Value, row: Row) {
        if let Some(index) = self.position(primary_column, key) {
            self.rows[index] = row;
        }
    }

    pub(crate) fn restore(&mut self, index: usize, row: Row) {
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
    }
}

/// A change recorded by a transaction so it can be reverted.
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    Inserted {
        table: String,
        primary_column: String,
        key: Value,
    },
    Updated {
        table: String,
        primary_column: String,
        key: Value,
        previous: Row,
    },
    Deleted {
        table: String,
        index: usize,
        previous: Row,
    },
}

/// Tables plus one async mutex per locked row.
#[derive(Debug, Default)]
pub(crate) struct Store {
    tables: Mutex<HashMap<String, Table>>,
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl Store {
    pub(crate) fn with_table<R>(&self, table: &str, f: impl FnOnce(&mut Table) -> R) -> R {
        let mut tables = self.tables.lock();
        f(tables.entry(table.to_string()).or_default())
    }

    pub(crate) fn row_lock(&self, key: &LockKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(key.clone()).or_default())
    }

    /// Locks one row until the returned guard drops.
    pub(crate) async fn lock_row(self: &Arc<Self>, key: LockKey) -> RowGuard {
        let guard = self.row_lock(&key).lock_owned().await;
        RowGuard {
            store: Arc::clone(self),
            key,
            guard: Some(guard),
        }
    }

    /// Forgets locks that nobody holds or waits for.
    ///
    /// Guards and waiters each own a clone of the mutex, and clones are
    /// only handed out under the table lock, so a count of one means idle.
    pub(crate) fn release_locks<'a>(&self, keys: impl IntoIterator<Item = &'a LockKey>) {
        let mut locks = self.locks.lock();
        for key in keys {
            if locks.get(key).is_some_and(|mutex| Arc::strong_count(mutex) == 1) {
                locks.remove(key);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Reverts `changes`, newest first.
    pub(crate) fn revert(&self, changes: Vec<Undo>) {
        let mut tables = self.tables.lock();
        for change in changes.into_iter().rev() {
            match change {
                Undo::Inserted {
                    table,
                    primary_column,
                    key,
                } => {
                    if let Some(rows) = tables.get_mut(&table) {
                        rows.delete(&primary_column, &key);
                    }
                }
                Undo::Updated {
                    table,
                    primary_column,
                    key,
                    previous,
                } => {
                    if let Some(rows) = tables.get_mut(&table) {
                        rows.replace(&primary_column, &key, previous);
                    }
                }
                Undo::Deleted {
                    table,
                    index,
                    previous,
                } => tables.entry(table).or_default().restore(index, previous),
            }
        }
    }
}

/// A row lock held by a single write outside any transaction.
pub(crate) struct RowGuard {
    store: Arc<Store>,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.store.release_locks([&self.key]);
    }
}
