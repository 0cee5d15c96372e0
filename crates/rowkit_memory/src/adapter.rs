//! The in-memory [`Adapter`].

use crate::error::MemoryError;
use crate::stats::MemoryStats;
use crate::store::{lock_key, LockKey, RowGuard, Store, Undo};
use crate::transaction::MemoryTransaction;
use async_trait::async_trait;
use rowkit_core::{
    Adapter, CoreError, CoreResult, QueryClient, QuerySpec, Row, RowTarget,
    TransactionHandle, TransactionId,
};
use rowkit_value::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Stores tables in memory and implements transactions with row locks.
///
/// Named connections are accepted and all share one set of tables.
///
/// # Example
///
/// ```ignore
/// let adapter = Arc::new(MemoryAdapter::new());
/// let orm = Orm::new(adapter.clone());
/// // ...
/// assert_eq!(adapter.stats().inserts(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    store: Arc<Store>,
    stats: Arc<MemoryStats>,
    next_trx: AtomicU64,
}

impl MemoryAdapter {
    /// Creates an adapter with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row directly, outside any transaction.
    pub fn seed(&self, table: &str, primary_column: &str, row: Row) -> CoreResult<Row> {
        let row = self
            .store
            .with_table(table, |rows| rows.insert(table, primary_column, row))?;
        Ok(row)
    }

    /// Rows currently stored in `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.store.with_table(table, |rows| rows.rows().to_vec())
    }

    /// Call counters.
    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    fn transaction<'a>(
        &self,
        client: Option<&'a QueryClient>,
    ) -> CoreResult<Option<&'a MemoryTransaction>> {
        let Some(trx) = client.and_then(QueryClient::transaction) else {
            return Ok(None);
        };
        match trx.as_any().downcast_ref::<MemoryTransaction>() {
            Some(memory) if memory.belongs_to(&self.store) => {
                memory.ensure_open()?;
                Ok(Some(memory))
            }
            _ => Err(MemoryError::ForeignTransaction(trx.id()).into()),
        }
    }

    /// Locks the row for a write. Inside a transaction the lock is kept
    /// until it completes; otherwise it is released when the returned guard
    /// drops.
    async fn lock_for_write(
        &self,
        trx: Option<&MemoryTransaction>,
        key: LockKey,
    ) -> CoreResult<Option<RowGuard>> {
        match trx {
            Some(trx) => {
                trx.lock_row(key).await?;
                Ok(None)
            }
            None => Ok(Some(self.store.lock_row(key).await)),
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn insert(&self, target: &RowTarget, values: Row) -> CoreResult<Row> {
        self.stats.record_insert();
        let trx = self.transaction(target.client.as_ref())?;
        let row = self.seed(&target.table, &target.primary_column, values)?;
        let key = row
            .get(&target.primary_column)
            .cloned()
            .unwrap_or(Value::Null);
        trace!(table = %target.table, key = %key.key_string(), "inserted row");

        if let Some(trx) = trx {
            trx.record(Undo::Inserted {
                table: target.table.clone(),
                primary_column: target.primary_column.clone(),
                key: key.clone(),
            });
            trx.lock_row(lock_key(&target.table, &key)).await?;
        }
        Ok(row)
    }

    async fn update(&self, target: &RowTarget, values: Row) -> CoreResult<Row> {
        self.stats.record_update();
        let trx = self.transaction(target.client.as_ref())?;
        let _guard = self
            .lock_for_write(trx, lock_key(&target.table, &target.primary_value))
            .await?;

        let changed = self.store.with_table(&target.table, |rows| {
            rows.update(
                &target.table,
                &target.primary_column,
                &target.primary_value,
                values,
            )
        })?;
        let (previous, row) = changed.ok_or_else(|| {
            CoreError::row_not_found(
                &target.table,
                &target.primary_column,
                target.primary_value.key_string(),
            )
        })?;

        if let Some(trx) = trx {
            let key = row
                .get(&target.primary_column)
                .cloned()
                .unwrap_or_else(|| target.primary_value.clone());
            trx.record(Undo::Updated {
                table: target.table.clone(),
                primary_column: target.primary_column.clone(),
                key,
                previous,
            });
        }
        Ok(row)
    }

    async fn delete(&self, target: &RowTarget) -> CoreResult<()> {
        self.stats.record_delete();
        let trx = self.transaction(target.client.as_ref())?;
        let _guard = self
            .lock_for_write(trx, lock_key(&target.table, &target.primary_value))
            .await?;

        let removed = self.store.with_table(&target.table, |rows| {
            rows.delete(&target.primary_column, &target.primary_value)
        });
        match (removed, trx) {
            (Some((index, previous)), Some(trx)) => trx.record(Undo::Deleted {
                table: target.table.clone(),
                index,
                previous,
            }),
            (None, _) => trace!(
                table = %target.table,
                key = %target.primary_value.key_string(),
                "delete matched no row"
            ),
            _ => {}
        }
        Ok(())
    }

    async fn select(&self, query: &QuerySpec) -> CoreResult<Vec<Row>> {
        self.stats.record_select();
        let trx = self.transaction(query.client.as_ref())?;
        let read = || {
            self.store
                .with_table(&query.table, |rows| query.apply(rows.rows().iter().cloned()))
        };

        let Some(trx) = trx.filter(|_| query.for_update) else {
            return Ok(read());
        };
        // Lock every returned row; if any lock had to be taken, read again
        // because the row may have changed while waiting.
        loop {
            let rows = read();
            let mut acquired = false;
            for row in &rows {
                if let Some(key) = row.get(&query.primary_column) {
                    acquired |= trx.lock_row(lock_key(&query.table, key)).await?;
                }
            }
            if !acquired {
                return Ok(rows);
            }
        }
    }

    async fn count(&self, query: &QuerySpec) -> CoreResult<u64> {
        self.stats.record_count();
        self.transaction(query.client.as_ref())?;
        let matched = self.store.with_table(&query.table, |rows| {
            rows.rows().iter().filter(|row| query.matches(row)).count()
        });
        Ok(matched as u64)
    }

    async fn begin_transaction(&self, connection: Option<&str>) -> CoreResult<TransactionHandle> {
        let id = TransactionId::new(self.next_trx.fetch_add(1, Ordering::SeqCst) + 1);
        self.stats.record_transaction_start();
        debug!(trx = %id, connection = connection.unwrap_or("default"), "began transaction");
        Ok(Arc::new(MemoryTransaction::new(
            id,
            connection.map(str::to_string),
            Arc::clone(&self.store),
            Arc::clone(&self.stats),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowkit_core::{Predicate, RecordingAdapter, TransactionEvent};
    use rowkit_value::values;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn target(client: Option<QueryClient>, key: Value) -> RowTarget {
        RowTarget {
            model: "User".into(),
            table: "users".into(),
            primary_column: "id".into(),
            primary_value: key,
            client,
        }
    }

    fn by_id(id: i64, client: Option<QueryClient>) -> QuerySpec {
        let mut spec = QuerySpec::new("User", "users", "id");
        spec.predicates.push(Predicate::eq("id", id));
        spec.for_update = true;
        spec.client = client;
        spec
    }

    #[tokio::test]
    async fn rollback_reverts_writes() {
        let adapter = MemoryAdapter::new();
        adapter.seed("users", "id", values! { "name" => "a" }).unwrap();

        let trx = adapter.begin_transaction(None).await.unwrap();
        let client = Some(QueryClient::Transaction(Arc::clone(&trx)));
        adapter
            .insert(&target(client.clone(), Value::Null), values! { "name" => "b" })
            .await
            .unwrap();
        adapter
            .update(&target(client.clone(), Value::Integer(1)), values! { "name" => "z" })
            .await
            .unwrap();
        adapter
            .delete(&target(client.clone(), Value::Integer(1)))
            .await
            .unwrap();
        assert_eq!(adapter.rows("users").len(), 1);

        trx.rollback().await.unwrap();
        let rows = adapter.rows("users");
        assert_eq!(rows, vec![values! { "id" => 1, "name" => "a" }]);
        assert_eq!(adapter.stats().transactions_rolled_back(), 1);
    }

    #[tokio::test]
    async fn completed_transactions_reject_work() {
        let adapter = MemoryAdapter::new();
        let trx = adapter.begin_transaction(None).await.unwrap();
        trx.commit().await.unwrap();
        assert!(matches!(
            trx.commit().await,
            Err(CoreError::TransactionCompleted { id: 1 })
        ));
        let err = adapter
            .insert(
                &target(Some(QueryClient::Transaction(trx)), Value::Null),
                values! { "name" => "a" },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TransactionCompleted { .. }));
        assert!(adapter.rows("users").is_empty());
    }

    #[tokio::test]
    async fn foreign_transactions_are_rejected() {
        let adapter = MemoryAdapter::new();
        let other = RecordingAdapter::new().begin_transaction(None).await.unwrap();
        let err = adapter
            .select(&by_id(1, Some(QueryClient::Transaction(other))))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::External(_)));
    }

    #[tokio::test]
    async fn listeners_fire_on_matching_event() {
        let adapter = MemoryAdapter::new();
        let committed = Arc::new(AtomicBool::new(false));
        let rolled_back = Arc::new(AtomicBool::new(false));
        let trx = adapter.begin_transaction(Some("primary")).await.unwrap();
        let flag = Arc::clone(&committed);
        trx.on(
            TransactionEvent::Commit,
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        let flag = Arc::clone(&rolled_back);
        trx.on(
            TransactionEvent::Rollback,
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        trx.commit().await.unwrap();
        assert!(committed.load(Ordering::SeqCst));
        assert!(!rolled_back.load(Ordering::SeqCst));
        assert_eq!(trx.connection(), Some("primary"));
    }

    #[tokio::test]
    async fn locking_reads_wait_for_the_holder() {
        let adapter = Arc::new(MemoryAdapter::new());
        adapter
            .seed("users", "id", values! { "id" => 1, "points" => 0 })
            .unwrap();

        let first = adapter.begin_transaction(None).await.unwrap();
        let rows = adapter
            .select(&by_id(1, Some(QueryClient::Transaction(Arc::clone(&first)))))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let second = adapter.begin_transaction(None).await.unwrap();
        let waiter = {
            let adapter = Arc::clone(&adapter);
            let second = Arc::clone(&second);
            tokio::spawn(async move {
                adapter
                    .select(&by_id(1, Some(QueryClient::Transaction(second))))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        adapter
            .update(
                &target(Some(QueryClient::Transaction(Arc::clone(&first))), Value::Integer(1)),
                values! { "points" => 1 },
            )
            .await
            .unwrap();
        first.commit().await.unwrap();

        let rows = waiter.await.unwrap().unwrap();
        assert_eq!(rows[0]["points"], Value::Integer(1));
        second.rollback().await.unwrap();
        assert_eq!(adapter.store.lock_count(), 0);
    }

    #[tokio::test]
    async fn row_locks_are_released_after_writes() {
        let adapter = MemoryAdapter::new();
        for _ in 0..3 {
            adapter
                .insert(&target(None, Value::Null), values! { "points" => 0 })
                .await
                .unwrap();
        }
        for id in 1..=3 {
            adapter
                .update(&target(None, Value::Integer(id)), values! { "points" => id })
                .await
                .unwrap();
        }
        assert_eq!(adapter.store.lock_count(), 0);

        let trx = adapter.begin_transaction(None).await.unwrap();
        let client = Some(QueryClient::Transaction(Arc::clone(&trx)));
        adapter
            .update(&target(client.clone(), Value::Integer(1)), values! { "points" => 9 })
            .await
            .unwrap();
        adapter
            .delete(&target(client, Value::Integer(2)))
            .await
            .unwrap();
        assert_eq!(adapter.store.lock_count(), 2);

        trx.commit().await.unwrap();
        assert_eq!(adapter.store.lock_count(), 0);
    }
}
