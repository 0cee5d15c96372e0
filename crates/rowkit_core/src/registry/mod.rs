//! Model registry.
//!
//! Definitions are registered by name and booted on first use. Booting is
//! idempotent: the first boot of a type stores an immutable
//! [`ModelType`] that every later lookup shares.

mod definition;
mod keys;
mod model_type;

pub use definition::{
    Column, ColumnKind, ComputeFn, Computed, ExtrasFn, ExtrasSerialization, GetterFn,
    KeyGenerator, ModelDefinition, Relation, RelationKind, SerializeAs, SerializeFn, SetterFn,
    ValueTransform,
};
pub use keys::KeyResolver;
pub use model_type::{
    ColumnDefinition, ComputedDefinition, ModelType, RelationDefinition, RelationKeys,
};

use crate::error::{CoreError, CoreResult};
use crate::naming::NamingStrategy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Holds model definitions and their booted types.
pub struct Registry {
    definitions: RwLock<HashMap<String, Arc<ModelDefinition>>>,
    booted: RwLock<HashMap<String, Arc<ModelType>>>,
    default_naming: Arc<dyn NamingStrategy>,
    default_primary_key: String,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(default_naming: Arc<dyn NamingStrategy>) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            booted: RwLock::new(HashMap::new()),
            default_naming,
            default_primary_key: "id".to_string(),
        }
    }

    /// Sets the attribute treated as primary key when a model flags none.
    #[must_use]
    pub fn with_default_primary_key(mut self, attribute: impl Into<String>) -> Self {
        self.default_primary_key = attribute.into();
        self
    }

    /// Registers a definition.
    ///
    /// A definition may be replaced until its type has been booted.
    pub fn define(&self, definition: ModelDefinition) -> CoreResult<()> {
        if self.booted.read().contains_key(definition.name()) {
            return Err(CoreError::invalid_operation(format!(
                "\"{}\" model is already booted",
                definition.name()
            )));
        }
        self.definitions
            .write()
            .insert(definition.name().to_string(), Arc::new(definition));
        Ok(())
    }

    /// Whether a definition exists for `name`.
    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    /// Whether `name` has been booted.
    pub fn is_booted(&self, name: &str) -> bool {
        self.booted.read().contains_key(name)
    }

    /// Names of all defined models, sorted.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Boots `name` and its ancestors, returning the shared booted type.
    pub fn boot(&self, name: &str) -> CoreResult<Arc<ModelType>> {
        self.boot_with_chain(name, &mut Vec::new())
    }

    fn boot_with_chain(&self, name: &str, chain: &mut Vec<String>) -> CoreResult<Arc<ModelType>> {
        if let Some(ty) = self.booted.read().get(name) {
            return Ok(Arc::clone(ty));
        }
        if chain.iter().any(|seen| seen == name) {
            return Err(CoreError::invalid_operation(format!(
                "circular inheritance: {} -> {name}",
                chain.join(" -> ")
            )));
        }

        let definition = self
            .definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::unknown_model(name))?;

        chain.push(name.to_string());
        let parent = match &definition.extends {
            Some(parent) => Some(self.boot_with_chain(parent, chain)?),
            None => None,
        };

        let ty = Arc::new(ModelType::boot(
            &definition,
            parent.as_deref(),
            &self.default_naming,
            &self.default_primary_key,
        )?);
        debug!(
            model = %ty.name(),
            table = %ty.table(),
            columns = ty.columns().count(),
            "booted model"
        );

        // A concurrent boot of the same type may have won the race; keep the
        // first so every caller shares one instance.
        let mut booted = self.booted.write();
        Ok(Arc::clone(
            booted.entry(name.to_string()).or_insert(ty),
        ))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("definitions", &self.model_names())
            .field("booted", &self.booted.read().len())
            .finish()
    }
}
