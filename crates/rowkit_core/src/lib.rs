//! # rowkit Core
//!
//! Model layer for rowkit.
//!
//! This crate provides:
//! - a registry of model definitions booted into immutable [`ModelType`]s,
//!   with single inheritance and configurable naming
//! - [`Model`] instances with attribute storage, dirty tracking, extras,
//!   preloaded relations and serialization
//! - lifecycle hooks around create, update, save, delete and reads
//! - persistence coordination through the [`Adapter`] contract, including
//!   transaction-scoped lookups for the upsert family
//!
//! Storage is pluggable. `rowkit_memory` provides an in-memory adapter with
//! row locks; [`RecordingAdapter`] records calls for unit tests.
//!
//! ## Usage
//!
//! ```ignore
//! use rowkit_core::{Column, ModelDefinition, Orm};
//! use rowkit_value::values;
//!
//! let orm = Orm::new(adapter);
//! orm.define(
//!     ModelDefinition::new("User")
//!         .column(Column::primary_key("id"))
//!         .column(Column::new("email"))
//!         .column(Column::new("password").hidden()),
//! )?;
//!
//! let users = orm.model("User")?;
//! let mut user = users.create(values! { "email" => "a@b.c" }).await?;
//! user.set("email", "c@d.e")?;
//! user.save().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod class;
mod config;
mod error;
mod hooks;
mod model;
mod naming;
mod orm;
mod query;
mod registry;
mod types;

pub use adapter::{
    compare_values, Adapter, AdapterCall, Operator, Predicate, QueryClient, QuerySpec,
    RecordingAdapter, RecordingTransaction, Row, RowTarget, Transaction, TransactionCallback,
    TransactionEvent, TransactionHandle,
};
pub use class::ModelClass;
pub use config::OrmConfig;
pub use error::{CoreError, CoreResult};
pub use hooks::{
    model_hook, models_hook, page_hook, paginate_hook, query_hook, Hook, HookEvent, HookPayload,
    HookRegistry,
};
pub use model::{CherryPick, FieldSelector, Model, Related};
pub use naming::{IdentityNaming, NamingStrategy, PaginationMetaKeys, SnakeCaseNaming};
pub use orm::Orm;
pub use query::{ModelQuery, Page};
pub use registry::{
    Column, ColumnDefinition, ColumnKind, ComputeFn, Computed, ComputedDefinition, ExtrasFn,
    ExtrasSerialization, GetterFn, KeyGenerator, KeyResolver, ModelDefinition, ModelType,
    Registry, Relation, RelationDefinition, RelationKeys, RelationKind, SerializeAs,
    SerializeFn, SetterFn, ValueTransform,
};
pub use types::{Cardinality, SortDirection, TransactionId};

pub use async_trait::async_trait;
