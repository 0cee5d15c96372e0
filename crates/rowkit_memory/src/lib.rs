//! # rowkit Memory
//!
//! In-memory storage adapter for rowkit.
//!
//! This crate provides:
//! - [`MemoryAdapter`], an [`rowkit_core::Adapter`] keeping tables in memory
//! - [`MemoryTransaction`], with an undo log for rollback and row locks
//!   held until the transaction completes
//! - [`MemoryStats`] call counters for tests
//!
//! Writes inside a transaction are visible to other readers immediately.
//! Isolation comes only from row locks: a locking read or a write waits
//! while another open transaction holds the row.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod error;
mod stats;
mod store;
mod transaction;

pub use adapter::MemoryAdapter;
pub use error::{MemoryError, MemoryResult};
pub use stats::MemoryStats;
pub use transaction::MemoryTransaction;
