//! The ORM handle.

use crate::adapter::{Adapter, TransactionHandle};
use crate::class::ModelClass;
use crate::config::OrmConfig;
use crate::error::CoreResult;
use crate::registry::{ModelDefinition, Registry};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

struct OrmInner {
    adapter: Arc<dyn Adapter>,
    registry: Registry,
    config: OrmConfig,
}

/// Entry point tying a storage adapter to a model registry.
///
/// `Orm` is cheap to clone; clones share the adapter and registry.
///
/// ```ignore
/// let orm = Orm::new(Arc::new(MemoryAdapter::new()));
/// orm.define(
///     ModelDefinition::new("User")
///         .column(Column::primary_key("id"))
///         .column(Column::new("email")),
/// )?;
/// let user = orm.model("User")?.create(values! { "email" => "a@b.c" }).await?;
/// ```
#[derive(Clone)]
pub struct Orm {
    inner: Arc<OrmInner>,
}

impl Orm {
    /// Creates an ORM with the default configuration.
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self::with_config(adapter, OrmConfig::default())
    }

    /// Creates an ORM with a custom configuration.
    pub fn with_config(adapter: Arc<dyn Adapter>, config: OrmConfig) -> Self {
        info!(
            naming = ?config.naming,
            case_insensitive_keys = config.case_insensitive_keys,
            "orm created"
        );
        Self {
            inner: Arc::new(OrmInner {
                registry: Registry::new(Arc::clone(&config.naming))
                    .with_default_primary_key(config.default_primary_key.clone()),
                adapter,
                config,
            }),
        }
    }

    /// Registers a model definition. Types are booted lazily on first use.
    pub fn define(&self, definition: ModelDefinition) -> CoreResult<()> {
        debug!(model = %definition.name(), "defining model");
        self.inner.registry.define(definition)
    }

    /// Boots `name` if needed and returns its class handle.
    pub fn model(&self, name: &str) -> CoreResult<ModelClass> {
        let ty = self.inner.registry.boot(name)?;
        Ok(ModelClass::new(self.clone(), ty, None))
    }

    /// The model registry.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// The storage adapter.
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.inner.adapter
    }

    /// Configuration.
    pub fn config(&self) -> &OrmConfig {
        &self.inner.config
    }

    /// Begins a transaction on the default connection.
    pub async fn transaction(&self) -> CoreResult<TransactionHandle> {
        self.inner.adapter.begin_transaction(None).await
    }

    /// Begins a transaction on a named connection.
    pub async fn transaction_on(&self, connection: &str) -> CoreResult<TransactionHandle> {
        self.inner.adapter.begin_transaction(Some(connection)).await
    }
}

impl fmt::Debug for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orm")
            .field("registry", &self.inner.registry)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
