//! Transaction handles.

use super::{Adapter, QueryClient};
use crate::error::CoreResult;
use crate::types::TransactionId;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Completion events a transaction can notify about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionEvent {
    /// The transaction committed.
    Commit,
    /// The transaction rolled back.
    Rollback,
}

/// Callback run once when a transaction completes.
pub type TransactionCallback = Box<dyn FnOnce() + Send>;

/// An open adapter transaction.
///
/// A transaction completes exactly once, by commit or rollback. Completing
/// it a second time fails with [`crate::CoreError::TransactionCompleted`].
#[async_trait]
pub trait Transaction: fmt::Debug + Send + Sync {
    /// Transaction identifier.
    fn id(&self) -> TransactionId;

    /// Connection the transaction was opened on.
    fn connection(&self) -> Option<&str>;

    /// Whether the transaction has committed or rolled back.
    fn is_completed(&self) -> bool;

    /// Registers a callback for a completion event.
    fn on(&self, event: TransactionEvent, callback: TransactionCallback);

    /// Commits the transaction.
    async fn commit(&self) -> CoreResult<()>;

    /// Rolls the transaction back.
    async fn rollback(&self) -> CoreResult<()>;

    /// Access to the concrete type, for adapters that need their own state.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a transaction.
pub type TransactionHandle = Arc<dyn Transaction>;

/// A transaction that is either borrowed from the caller or owned by the
/// operation that opened it.
///
/// Owned transactions are committed when the work succeeds and rolled back
/// when it fails; borrowed ones are left for their owner to complete.
pub(crate) struct ManagedTransaction {
    handle: TransactionHandle,
    owned: bool,
}

impl ManagedTransaction {
    /// Reuses the caller's open transaction, or begins a new one on the
    /// caller's connection.
    pub(crate) async fn open(
        adapter: &dyn Adapter,
        client: Option<&QueryClient>,
    ) -> CoreResult<Self> {
        match client {
            Some(QueryClient::Transaction(trx)) if !trx.is_completed() => Ok(Self {
                handle: Arc::clone(trx),
                owned: false,
            }),
            Some(QueryClient::Connection(name)) => Self::begin(adapter, Some(name)).await,
            _ => Self::begin(adapter, None).await,
        }
    }

    async fn begin(adapter: &dyn Adapter, connection: Option<&str>) -> CoreResult<Self> {
        let handle = adapter.begin_transaction(connection).await?;
        debug!(trx = %handle.id(), "opened managed transaction");
        Ok(Self {
            handle,
            owned: true,
        })
    }

    pub(crate) fn handle(&self) -> &TransactionHandle {
        &self.handle
    }

    /// Completes an owned transaction according to `result`.
    pub(crate) async fn finish<T>(self, result: CoreResult<T>) -> CoreResult<T> {
        if !self.owned {
            return result;
        }
        match result {
            Ok(value) => {
                self.handle.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.handle.rollback().await {
                    warn!(
                        trx = %self.handle.id(),
                        error = %rollback_err,
                        "rollback after failed operation did not complete"
                    );
                }
                Err(err)
            }
        }
    }
}
