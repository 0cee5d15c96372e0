//! Booted model types.

use super::definition::{
    Column, ColumnKind, ComputeFn, Computed, ExtrasSerialization, GetterFn, KeyGenerator,
    ModelDefinition, Relation, RelationKind, SerializeAs, SerializeFn, SetterFn,
};
use super::keys::KeyResolver;
use crate::error::{CoreError, CoreResult};
use crate::hooks::HookRegistry;
use crate::naming::NamingStrategy;
use crate::types::Cardinality;
use rowkit_value::{coerce_date, coerce_datetime, Value, ValueMap};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

fn resolve_serialized(
    serialize_as: &SerializeAs,
    default: impl FnOnce() -> String,
) -> Option<String> {
    match serialize_as {
        SerializeAs::Default => Some(default()),
        SerializeAs::Named(name) => Some(name.clone()),
        SerializeAs::Hidden => None,
    }
}

/// A column with its storage and serialized names resolved.
#[derive(Clone)]
pub struct ColumnDefinition {
    declaration: Column,
    column_name: String,
    serialized_name: Option<String>,
}

impl ColumnDefinition {
    fn resolve(model: &str, declaration: &Column, naming: &dyn NamingStrategy) -> Self {
        let column_name = declaration
            .column_name
            .clone()
            .unwrap_or_else(|| naming.column_name(model, &declaration.attribute));
        let serialized_name = resolve_serialized(&declaration.serialize_as, || {
            naming.serialized_name(model, &declaration.attribute)
        });
        Self {
            declaration: declaration.clone(),
            column_name,
            serialized_name,
        }
    }

    /// Attribute name.
    pub fn attribute(&self) -> &str {
        &self.declaration.attribute
    }

    /// Storage column name.
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Serialized name, `None` when the column is hidden.
    pub fn serialized_name(&self) -> Option<&str> {
        self.serialized_name.as_deref()
    }

    /// Whether this is the primary key column.
    pub fn is_primary(&self) -> bool {
        self.declaration.is_primary
    }

    /// Column kind.
    pub fn kind(&self) -> ColumnKind {
        self.declaration.kind
    }

    /// Free-form metadata.
    pub fn meta(&self) -> &ValueMap {
        &self.declaration.meta
    }

    /// Whether a read accessor is installed.
    pub fn has_getter(&self) -> bool {
        self.declaration.getter.is_some()
    }

    /// Whether a write accessor is installed.
    pub fn has_setter(&self) -> bool {
        self.declaration.setter.is_some()
    }

    pub(crate) fn getter(&self) -> Option<&GetterFn> {
        self.declaration.getter.as_ref()
    }

    pub(crate) fn setter(&self) -> Option<&SetterFn> {
        self.declaration.setter.as_ref()
    }

    pub(crate) fn serializer(&self) -> Option<&SerializeFn> {
        self.declaration.serialize.as_ref()
    }

    /// Converts a value for the adapter: type coercion, then the column's
    /// prepare transform.
    pub fn prepare_value(&self, model: &str, value: Value) -> CoreResult<Value> {
        let value = self.coerce(model, value)?;
        match &self.declaration.prepare {
            Some(prepare) => prepare(value),
            None => Ok(value),
        }
    }

    /// Converts a value read from the adapter: type coercion, then the
    /// column's consume transform.
    pub fn consume_value(&self, model: &str, value: Value) -> CoreResult<Value> {
        let value = self.coerce(model, value)?;
        match &self.declaration.consume {
            Some(consume) => consume(value),
            None => Ok(value),
        }
    }

    fn coerce(&self, model: &str, value: Value) -> CoreResult<Value> {
        let coerced = match self.declaration.kind {
            ColumnKind::Plain => return Ok(value),
            ColumnKind::DateTime { .. } => coerce_datetime(value),
            ColumnKind::Date => coerce_date(value),
        };
        coerced.map_err(|err| {
            CoreError::invalid_column_value(model, self.attribute(), err.to_string())
        })
    }
}

impl fmt::Debug for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDefinition")
            .field("attribute", &self.declaration.attribute)
            .field("column_name", &self.column_name)
            .field("serialized_name", &self.serialized_name)
            .field("is_primary", &self.declaration.is_primary)
            .field("kind", &self.declaration.kind)
            .finish_non_exhaustive()
    }
}

/// A computed property with its serialized name resolved.
#[derive(Clone)]
pub struct ComputedDefinition {
    name: String,
    serialized_name: Option<String>,
    compute: ComputeFn,
}

impl ComputedDefinition {
    fn resolve(model: &str, declaration: &Computed, naming: &dyn NamingStrategy) -> Self {
        Self {
            name: declaration.name.clone(),
            serialized_name: resolve_serialized(&declaration.serialize_as, || {
                naming.serialized_name(model, &declaration.name)
            }),
            compute: Arc::clone(&declaration.compute),
        }
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialized name, `None` when hidden.
    pub fn serialized_name(&self) -> Option<&str> {
        self.serialized_name.as_deref()
    }

    pub(crate) fn compute(&self) -> &ComputeFn {
        &self.compute
    }
}

impl fmt::Debug for ComputedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedDefinition")
            .field("name", &self.name)
            .field("serialized_name", &self.serialized_name)
            .finish_non_exhaustive()
    }
}

/// Resolved key attributes of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationKeys {
    /// Local key attribute. Lives on the related model for `BelongsTo`,
    /// on the owner otherwise.
    pub local: String,
    /// Foreign key attribute. Lives on the owner for `BelongsTo`, on the
    /// related model otherwise.
    pub foreign: String,
}

/// A relation with its serialized name resolved.
#[derive(Debug, Clone)]
pub struct RelationDefinition {
    declaration: Relation,
    serialized_name: Option<String>,
}

impl RelationDefinition {
    fn resolve(model: &str, declaration: &Relation, naming: &dyn NamingStrategy) -> Self {
        Self {
            serialized_name: resolve_serialized(&declaration.serialize_as, || {
                naming.relation_serialized_name(model, &declaration.name)
            }),
            declaration: declaration.clone(),
        }
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    /// Relation kind.
    pub fn kind(&self) -> RelationKind {
        self.declaration.kind
    }

    /// Cardinality of the relation.
    pub fn cardinality(&self) -> Cardinality {
        self.declaration.kind.cardinality()
    }

    /// Name of the related model.
    pub fn related(&self) -> &str {
        &self.declaration.related
    }

    /// Serialized name, `None` when hidden.
    pub fn serialized_name(&self) -> Option<&str> {
        self.serialized_name.as_deref()
    }

    /// Resolves the local and foreign key attributes.
    ///
    /// Explicit keys from the declaration win; the owner's naming strategy
    /// derives the rest.
    pub fn keys(&self, owner: &ModelType, related: &ModelType) -> RelationKeys {
        let kind = self.declaration.kind;
        let local = self.declaration.local_key.clone().unwrap_or_else(|| {
            owner
                .naming()
                .relation_local_key(kind, owner.primary_key(), related.primary_key())
        });
        let foreign = self.declaration.foreign_key.clone().unwrap_or_else(|| {
            owner.naming().relation_foreign_key(
                kind,
                (owner.name(), owner.primary_key()),
                (related.name(), related.primary_key()),
            )
        });
        RelationKeys { local, foreign }
    }
}

/// A booted model type.
///
/// Holds the fully resolved metadata of a model, including everything
/// inherited from its ancestors. Booted types are immutable and shared
/// behind an `Arc`.
pub struct ModelType {
    name: String,
    lineage: Vec<String>,
    table: String,
    primary_key: String,
    self_assign_primary_key: bool,
    key_generator: Option<KeyGenerator>,
    naming: Arc<dyn NamingStrategy>,
    extras: ExtrasSerialization,
    columns: BTreeMap<String, ColumnDefinition>,
    computed: BTreeMap<String, ComputedDefinition>,
    relations: BTreeMap<String, RelationDefinition>,
    hooks: HookRegistry,
    keys: KeyResolver,
}

impl ModelType {
    /// Boots a type from its declaration and its already booted parent.
    ///
    /// The parent's maps are copied, so declarations made here never leak
    /// into the parent or its other subtypes. Same-name declarations
    /// replace inherited ones.
    pub(crate) fn boot(
        definition: &ModelDefinition,
        parent: Option<&ModelType>,
        default_naming: &Arc<dyn NamingStrategy>,
        default_primary_key: &str,
    ) -> CoreResult<Self> {
        let name = definition.name.clone();
        let naming = definition
            .naming
            .clone()
            .or_else(|| parent.map(|p| Arc::clone(&p.naming)))
            .unwrap_or_else(|| Arc::clone(default_naming));

        let mut columns = parent.map(|p| p.columns.clone()).unwrap_or_default();
        for declaration in &definition.columns {
            let column = ColumnDefinition::resolve(&name, declaration, naming.as_ref());
            if column.is_primary() {
                for existing in columns.values_mut() {
                    existing.declaration.is_primary = false;
                }
            }
            columns.insert(column.attribute().to_string(), column);
        }
        if !columns.values().any(ColumnDefinition::is_primary) {
            if let Some(column) = columns.get_mut(default_primary_key) {
                column.declaration.is_primary = true;
            }
        }

        let primary_key = columns
            .values()
            .find(|column| column.is_primary())
            .map(|column| column.attribute().to_string())
            .ok_or_else(|| {
                CoreError::invalid_operation(format!(
                    "\"{name}\" model does not declare a primary key column"
                ))
            })?;

        let mut computed = parent.map(|p| p.computed.clone()).unwrap_or_default();
        for declaration in &definition.computed {
            computed.insert(
                declaration.name.clone(),
                ComputedDefinition::resolve(&name, declaration, naming.as_ref()),
            );
        }

        let mut relations = parent.map(|p| p.relations.clone()).unwrap_or_default();
        for declaration in &definition.relations {
            relations.insert(
                declaration.name.clone(),
                RelationDefinition::resolve(&name, declaration, naming.as_ref()),
            );
        }

        let mut hooks = parent.map(|p| p.hooks.clone()).unwrap_or_default();
        for (event, hook) in &definition.hooks {
            hooks.register(*event, Arc::clone(hook));
        }

        let table = definition
            .table
            .clone()
            .or_else(|| parent.map(|p| p.table.clone()))
            .unwrap_or_else(|| naming.table_name(&name));

        let mut lineage = vec![name.clone()];
        if let Some(parent) = parent {
            lineage.extend(parent.lineage.iter().cloned());
        }

        let keys = KeyResolver::from_columns(columns.values());

        Ok(Self {
            self_assign_primary_key: definition
                .self_assign_primary_key
                .or_else(|| parent.map(|p| p.self_assign_primary_key))
                .unwrap_or(false),
            key_generator: definition
                .key_generator
                .clone()
                .or_else(|| parent.and_then(|p| p.key_generator.clone())),
            extras: definition
                .extras
                .clone()
                .or_else(|| parent.map(|p| p.extras.clone()))
                .unwrap_or_default(),
            name,
            lineage,
            table,
            primary_key,
            naming,
            columns,
            computed,
            relations,
            hooks,
            keys,
        })
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This type's name followed by its ancestors' names.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Whether this type is `name` or inherits from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage.iter().any(|ancestor| ancestor == name)
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key attribute.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Primary key column name.
    pub fn primary_column(&self) -> &str {
        self.keys
            .column_for(&self.primary_key)
            .unwrap_or(&self.primary_key)
    }

    /// Whether primary key values are assigned by the application.
    pub fn self_assigns_primary_key(&self) -> bool {
        self.self_assign_primary_key
    }

    /// Key generator for self-assigned primary keys.
    pub fn key_generator(&self) -> Option<&KeyGenerator> {
        self.key_generator.as_ref()
    }

    /// Naming strategy in effect for this type.
    pub fn naming(&self) -> &Arc<dyn NamingStrategy> {
        &self.naming
    }

    /// Extras serialization mode.
    pub fn extras_serialization(&self) -> &ExtrasSerialization {
        &self.extras
    }

    /// Looks up a column by attribute name.
    pub fn column(&self, attribute: &str) -> Option<&ColumnDefinition> {
        self.columns.get(attribute)
    }

    /// Whether `attribute` is a declared column.
    pub fn has_column(&self, attribute: &str) -> bool {
        self.columns.contains_key(attribute)
    }

    /// All columns, ordered by attribute name.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.values()
    }

    /// Looks up a computed property.
    pub fn computed(&self, name: &str) -> Option<&ComputedDefinition> {
        self.computed.get(name)
    }

    /// All computed properties.
    pub fn computed_properties(&self) -> impl Iterator<Item = &ComputedDefinition> {
        self.computed.values()
    }

    /// Looks up a relation.
    pub fn relation(&self, name: &str) -> CoreResult<&RelationDefinition> {
        self.relations
            .get(name)
            .ok_or_else(|| CoreError::unknown_relation(&self.name, name))
    }

    /// All relations.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.relations.values()
    }

    /// Hooks registered for this type, ancestors first.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The attribute/column/serialized name maps.
    pub fn keys(&self) -> &KeyResolver {
        &self.keys
    }

    /// Column name for an attribute.
    pub fn column_name(&self, attribute: &str) -> CoreResult<&str> {
        self.keys
            .column_for(attribute)
            .ok_or_else(|| CoreError::unknown_attribute(&self.name, attribute))
    }

    /// Attribute name for a column.
    pub fn attribute_name(&self, column: &str) -> CoreResult<&str> {
        self.keys
            .attribute_for_column(column)
            .ok_or_else(|| CoreError::unknown_attribute(&self.name, column))
    }

    /// Serialized name for an attribute, `None` when suppressed.
    pub fn serialized_name(&self, attribute: &str) -> CoreResult<Option<&str>> {
        if !self.has_column(attribute) {
            return Err(CoreError::unknown_attribute(&self.name, attribute));
        }
        Ok(self.keys.serialized_for(attribute))
    }

    /// Attribute name for a serialized name.
    pub fn attribute_for_serialized(&self, serialized: &str) -> CoreResult<&str> {
        self.keys
            .attribute_for_serialized(serialized)
            .ok_or_else(|| CoreError::unknown_attribute(&self.name, serialized))
    }

    /// Resolves a fill/merge key: attribute names first, then column names.
    pub(crate) fn resolve_input_key<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if self.columns.contains_key(key) {
            Some(key)
        } else {
            self.keys.attribute_for_column(key)
        }
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("lineage", &self.lineage)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
