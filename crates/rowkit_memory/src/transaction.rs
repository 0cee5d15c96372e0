//! In-memory transactions.
//!
//! Writes apply to the tables immediately and are recorded in an undo log.
//! Rows read with `for_update` or written inside the transaction stay
//! locked until commit or rollback, so a second transaction touching the
//! same row waits for the first to finish.

use crate::stats::MemoryStats;
use crate::store::{LockKey, Store, Undo};
use async_trait::async_trait;
use parking_lot::Mutex;
use rowkit_core::{
    CoreError, CoreResult, Transaction, TransactionCallback, TransactionEvent, TransactionId,
};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace};

#[derive(Default)]
struct TransactionState {
    completed: bool,
    undo: Vec<Undo>,
    guards: HashMap<LockKey, OwnedMutexGuard<()>>,
    listeners: Vec<(TransactionEvent, TransactionCallback)>,
}

/// A transaction handed out by [`crate::MemoryAdapter`].
pub struct MemoryTransaction {
    id: TransactionId,
    connection: Option<String>,
    store: Arc<Store>,
    stats: Arc<MemoryStats>,
    state: Mutex<TransactionState>,
}

impl MemoryTransaction {
    pub(crate) fn new(
        id: TransactionId,
        connection: Option<String>,
        store: Arc<Store>,
        stats: Arc<MemoryStats>,
    ) -> Self {
        Self {
            id,
            connection,
            store,
            stats,
            state: Mutex::new(TransactionState::default()),
        }
    }

    /// Number of rows currently locked by this transaction.
    pub fn locked_rows(&self) -> usize {
        self.state.lock().guards.len()
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.state.lock().completed {
            return Err(CoreError::TransactionCompleted { id: self.id.as_u64() });
        }
        Ok(())
    }

    pub(crate) fn belongs_to(&self, store: &Arc<Store>) -> bool {
        Arc::ptr_eq(&self.store, store)
    }

    /// Waits for the row lock unless this transaction already holds it.
    /// Returns whether the lock was newly acquired.
    pub(crate) async fn lock_row(&self, key: LockKey) -> CoreResult<bool> {
        if self.state.lock().guards.contains_key(&key) {
            return Ok(false);
        }
        let mutex = self.store.row_lock(&key);
        trace!(trx = %self.id, table = %key.0, key = %key.1, "waiting for row lock");
        let guard = mutex.lock_owned().await;

        let mut state = self.state.lock();
        if state.completed {
            drop(state);
            drop(guard);
            self.store.release_locks([&key]);
            return Err(CoreError::TransactionCompleted { id: self.id.as_u64() });
        }
        state.guards.entry(key).or_insert(guard);
        Ok(true)
    }

    pub(crate) fn record(&self, change: Undo) {
        self.state.lock().undo.push(change);
    }

    fn complete(&self, event: TransactionEvent) -> CoreResult<()> {
        let (undo, guards, listeners) = {
            let mut state = self.state.lock();
            if state.completed {
                return Err(CoreError::TransactionCompleted { id: self.id.as_u64() });
            }
            state.completed = true;
            (
                std::mem::take(&mut state.undo),
                std::mem::take(&mut state.guards),
                std::mem::take(&mut state.listeners),
            )
        };

        if event == TransactionEvent::Rollback {
            self.store.revert(undo);
            self.stats.record_transaction_rollback();
        } else {
            self.stats.record_transaction_commit();
        }
        debug!(trx = %self.id, ?event, locks = guards.len(), "transaction completed");
        let keys: Vec<LockKey> = guards.keys().cloned().collect();
        drop(guards);
        self.store.release_locks(&keys);

        for (on, callback) in listeners {
            if on == event {
                callback();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    fn on(&self, event: TransactionEvent, callback: TransactionCallback) {
        self.state.lock().listeners.push((event, callback));
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

impl fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryTransaction")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("completed", &state.completed)
            .field("pending_changes", &state.undo.len())
            .field("locked_rows", &state.guards.len())
            .finish()
    }
}
