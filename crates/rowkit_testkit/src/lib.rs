//! # rowkit Testkit
//!
//! Test utilities for rowkit.
//!
//! This crate provides:
//! - Fixtures: an ORM over a fresh in-memory adapter with a small blog
//!   schema already defined
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowkit_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn creates_users() {
//!     let db = TestOrm::blog();
//!     let user = db.class("User").create(values! { "username" => "virk" }).await.unwrap();
//!     assert!(user.is_persisted());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use rowkit_value::values;
}

pub use fixtures::*;
pub use generators::*;

/// Installs a `tracing` subscriber for tests.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Output goes
/// through the test writer so it is captured per test. Calling this more
/// than once is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
