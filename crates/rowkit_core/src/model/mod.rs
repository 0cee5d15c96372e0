//! Model instances.
//!
//! A [`Model`] is one row's worth of state: current attributes, the
//! original snapshot used for dirty tracking, extras, preloaded relations
//! and lifecycle flags. Instances are created through a
//! [`crate::ModelClass`].

mod attributes;
mod dirty;
mod persistence;
mod relations;
mod serialize;

pub use relations::Related;
pub use serialize::{CherryPick, FieldSelector};

use crate::adapter::{QueryClient, Row, TransactionHandle};
use crate::class::ModelClass;
use crate::error::{CoreError, CoreResult};
use crate::orm::Orm;
use crate::registry::ModelType;
use parking_lot::Mutex;
use rowkit_value::{Value, ValueMap};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An instance of a model type.
pub struct Model {
    ty: Arc<ModelType>,
    orm: Orm,
    attributes: ValueMap,
    original: ValueMap,
    extras: ValueMap,
    sideloaded: ValueMap,
    preloaded: BTreeMap<String, Related>,
    persisted: bool,
    local: bool,
    deleted: bool,
    force_update: bool,
    fill_invoked: bool,
    client: Option<QueryClient>,
    write_seq: u64,
    versions: BTreeMap<String, u64>,
    getter_cache: Mutex<BTreeMap<String, (u64, Value)>>,
}

impl Model {
    pub(crate) fn new(orm: Orm, ty: Arc<ModelType>) -> Self {
        Self {
            ty,
            orm,
            attributes: ValueMap::new(),
            original: ValueMap::new(),
            extras: ValueMap::new(),
            sideloaded: ValueMap::new(),
            preloaded: BTreeMap::new(),
            persisted: false,
            local: true,
            deleted: false,
            force_update: false,
            fill_invoked: false,
            client: None,
            write_seq: 0,
            versions: BTreeMap::new(),
            getter_cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Builds a persisted instance from an adapter row.
    pub(crate) fn from_row(
        orm: Orm,
        ty: Arc<ModelType>,
        row: Row,
        client: Option<QueryClient>,
        sideloaded: ValueMap,
    ) -> CoreResult<Self> {
        let mut model = Self::new(orm, ty);
        model.local = false;
        model.client = client;
        model.consume_adapter_result(row)?;
        model.sideloaded = sideloaded;
        model.hydrate_original();
        model.persisted = true;
        Ok(model)
    }

    /// The booted type of this instance.
    pub fn model_type(&self) -> &Arc<ModelType> {
        &self.ty
    }

    /// Model name.
    pub fn name(&self) -> &str {
        self.ty.name()
    }

    /// The ORM this instance belongs to.
    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    /// Class handle for this instance's type, bound to its client.
    pub fn class(&self) -> ModelClass {
        ModelClass::new(self.orm.clone(), Arc::clone(&self.ty), self.client().cloned())
    }

    /// Whether the row exists in storage.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Whether the instance has not been persisted yet.
    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    /// Whether the instance was created locally rather than read from
    /// storage.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Whether the instance was deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Makes the next save issue an update even when nothing is dirty.
    pub fn enable_force_update(&mut self) -> &mut Self {
        self.force_update = true;
        self
    }

    /// Binds a transaction used by later persistence calls.
    pub fn use_transaction(&mut self, trx: TransactionHandle) -> &mut Self {
        self.client = Some(QueryClient::Transaction(trx));
        self
    }

    /// Binds a named connection used by later persistence calls.
    pub fn use_connection(&mut self, name: impl Into<String>) -> &mut Self {
        self.client = Some(QueryClient::Connection(name.into()));
        self
    }

    pub(crate) fn bind_client(&mut self, client: Option<QueryClient>) {
        self.client = client;
    }

    /// The bound client. A bound transaction that has completed counts as
    /// no binding.
    pub fn client(&self) -> Option<&QueryClient> {
        self.client.as_ref().filter(|client| !client.is_completed())
    }

    /// The bound transaction, if it is still open.
    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.client().and_then(QueryClient::transaction)
    }

    /// Values that came with the query rather than from the row.
    pub fn sideloaded(&self) -> &ValueMap {
        &self.sideloaded
    }

    /// Replaces the sideloaded values.
    pub fn set_sideloaded(&mut self, values: ValueMap) -> &mut Self {
        self.sideloaded = values;
        self
    }

    /// Current primary key value.
    pub fn primary_key_value(&self) -> Option<&Value> {
        self.attributes
            .get(self.ty.primary_key())
            .filter(|value| !value.is_undefined())
    }

    pub(crate) fn ensure_not_deleted(&self) -> CoreResult<()> {
        if self.deleted {
            return Err(CoreError::DeletedInstance {
                model: self.ty.name().to_string(),
            });
        }
        Ok(())
    }
}

impl Clone for Model {
    fn clone(&self) -> Self {
        Self {
            ty: Arc::clone(&self.ty),
            orm: self.orm.clone(),
            attributes: self.attributes.clone(),
            original: self.original.clone(),
            extras: self.extras.clone(),
            sideloaded: self.sideloaded.clone(),
            preloaded: self.preloaded.clone(),
            persisted: self.persisted,
            local: self.local,
            deleted: self.deleted,
            force_update: self.force_update,
            fill_invoked: self.fill_invoked,
            client: self.client.clone(),
            write_seq: self.write_seq,
            versions: self.versions.clone(),
            getter_cache: Mutex::new(self.getter_cache.lock().clone()),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.ty.name())
            .field("attributes", &self.attributes)
            .field("extras", &self.extras)
            .field("preloaded", &self.preloaded.keys().collect::<Vec<_>>())
            .field("persisted", &self.persisted)
            .field("deleted", &self.deleted)
            .finish_non_exhaustive()
    }
}
