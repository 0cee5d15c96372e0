//! Model declarations.
//!
//! A [`ModelDefinition`] is the unbooted description of a model type: its
//! columns, computed properties, relations, hooks and table settings. It
//! is handed to the registry once and booted lazily on first use.

use crate::error::CoreResult;
use crate::hooks::{Hook, HookEvent};
use crate::model::Model;
use crate::naming::NamingStrategy;
use crate::types::Cardinality;
use rowkit_value::{Value, ValueMap};
use std::fmt;
use std::sync::Arc;

/// Transforms a value on its way to or from the adapter.
pub type ValueTransform = Arc<dyn Fn(Value) -> CoreResult<Value> + Send + Sync>;

/// Custom serialization for a column: `(value, attribute, instance)`.
pub type SerializeFn = Arc<dyn Fn(&Value, &str, &Model) -> serde_json::Value + Send + Sync>;

/// Custom read accessor for a column: `(instance, attribute)`.
pub type GetterFn = Arc<dyn Fn(&Model, &str) -> CoreResult<Value> + Send + Sync>;

/// Custom write accessor for a column: `(instance, attribute, value)`.
pub type SetterFn = Arc<dyn Fn(&mut Model, &str, Value) -> CoreResult<()> + Send + Sync>;

/// Derives a computed property from an instance.
pub type ComputeFn = Arc<dyn Fn(&Model) -> Value + Send + Sync>;

/// Custom serialization for the extras bag.
pub type ExtrasFn =
    Arc<dyn Fn(&Model) -> serde_json::Map<String, serde_json::Value> + Send + Sync>;

/// How a column, computed property or relation appears in serialized output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SerializeAs {
    /// Name derived from the naming strategy.
    #[default]
    Default,
    /// Explicit serialized name.
    Named(String),
    /// Never serialized.
    Hidden,
}

/// Type-specific handling of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKind {
    /// No coercion.
    #[default]
    Plain,
    /// Date-time column. Text values are parsed; auto flags fill the column
    /// with the current time on insert and/or update.
    DateTime {
        /// Set on insert when no value is present.
        auto_create: bool,
        /// Set on every persisted update.
        auto_update: bool,
    },
    /// Calendar date column.
    Date,
}

/// Generates primary key values for self-assigning models.
#[derive(Clone)]
pub enum KeyGenerator {
    /// Random v4 UUID rendered as text.
    UuidV4,
    /// User supplied generator.
    Custom(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl KeyGenerator {
    /// Produces a new key value.
    pub fn generate(&self) -> Value {
        match self {
            KeyGenerator::UuidV4 => Value::Text(uuid::Uuid::new_v4().to_string()),
            KeyGenerator::Custom(f) => f(),
        }
    }
}

impl fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyGenerator::UuidV4 => f.write_str("UuidV4"),
            KeyGenerator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How the extras bag appears in serialized output.
#[derive(Clone, Default)]
pub enum ExtrasSerialization {
    /// Extras are not serialized.
    #[default]
    Skip,
    /// Extras are serialized under the configured extras key.
    Bag,
    /// Extras are serialized by a custom function whose output is merged
    /// into the top-level object.
    Custom(ExtrasFn),
}

impl fmt::Debug for ExtrasSerialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtrasSerialization::Skip => f.write_str("Skip"),
            ExtrasSerialization::Bag => f.write_str("Bag"),
            ExtrasSerialization::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A column declaration.
///
/// ```
/// use rowkit_core::Column;
///
/// let column = Column::new("createdAt")
///     .column_name("created_at")
///     .date_time()
///     .auto_create();
/// assert_eq!(column.attribute(), "createdAt");
/// ```
#[derive(Clone)]
pub struct Column {
    pub(crate) attribute: String,
    pub(crate) column_name: Option<String>,
    pub(crate) serialize_as: SerializeAs,
    pub(crate) is_primary: bool,
    pub(crate) kind: ColumnKind,
    pub(crate) prepare: Option<ValueTransform>,
    pub(crate) consume: Option<ValueTransform>,
    pub(crate) serialize: Option<SerializeFn>,
    pub(crate) getter: Option<GetterFn>,
    pub(crate) setter: Option<SetterFn>,
    pub(crate) meta: ValueMap,
}

impl Column {
    /// Declares a column for `attribute`.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            column_name: None,
            serialize_as: SerializeAs::Default,
            is_primary: false,
            kind: ColumnKind::Plain,
            prepare: None,
            consume: None,
            serialize: None,
            getter: None,
            setter: None,
            meta: ValueMap::new(),
        }
    }

    /// Declares the primary key column.
    pub fn primary_key(attribute: impl Into<String>) -> Self {
        Self::new(attribute).primary()
    }

    /// Returns the attribute name.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Sets an explicit storage column name.
    #[must_use]
    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    /// Sets an explicit serialized name.
    #[must_use]
    pub fn serialize_as(mut self, name: impl Into<String>) -> Self {
        self.serialize_as = SerializeAs::Named(name.into());
        self
    }

    /// Excludes the column from serialized output.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.serialize_as = SerializeAs::Hidden;
        self
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Marks the column as a date-time column.
    #[must_use]
    pub fn date_time(mut self) -> Self {
        if !matches!(self.kind, ColumnKind::DateTime { .. }) {
            self.kind = ColumnKind::DateTime {
                auto_create: false,
                auto_update: false,
            };
        }
        self
    }

    /// Fills the column with the current time on insert.
    #[must_use]
    pub fn auto_create(mut self) -> Self {
        self = self.date_time();
        if let ColumnKind::DateTime { auto_create, .. } = &mut self.kind {
            *auto_create = true;
        }
        self
    }

    /// Fills the column with the current time on insert and on every update.
    #[must_use]
    pub fn auto_update(mut self) -> Self {
        self = self.date_time();
        if let ColumnKind::DateTime { auto_update, .. } = &mut self.kind {
            *auto_update = true;
        }
        self
    }

    /// Marks the column as a calendar date column.
    #[must_use]
    pub fn date(mut self) -> Self {
        self.kind = ColumnKind::Date;
        self
    }

    /// Transforms values before they are handed to the adapter.
    #[must_use]
    pub fn prepare<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> CoreResult<Value> + Send + Sync + 'static,
    {
        self.prepare = Some(Arc::new(f));
        self
    }

    /// Transforms values read back from the adapter.
    #[must_use]
    pub fn consume<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> CoreResult<Value> + Send + Sync + 'static,
    {
        self.consume = Some(Arc::new(f));
        self
    }

    /// Customizes how the value is serialized.
    #[must_use]
    pub fn serialize_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &str, &Model) -> serde_json::Value + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    /// Installs a read accessor.
    #[must_use]
    pub fn get<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, &str) -> CoreResult<Value> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(f));
        self
    }

    /// Installs a read accessor whose result is cached until the attribute
    /// is written again.
    #[must_use]
    pub fn cached_get<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let derive = Arc::new(f);
        self.getter = Some(Arc::new(move |model: &Model, attribute: &str| {
            Ok(model.cached_attribute(attribute, derive.as_ref()))
        }));
        self
    }

    /// Installs a write accessor. The accessor stores values with
    /// [`Model::set_raw`].
    #[must_use]
    pub fn set<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Model, &str, Value) -> CoreResult<()> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(f));
        self
    }

    /// Attaches free-form metadata.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("attribute", &self.attribute)
            .field("column_name", &self.column_name)
            .field("serialize_as", &self.serialize_as)
            .field("is_primary", &self.is_primary)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A computed property declaration.
#[derive(Clone)]
pub struct Computed {
    pub(crate) name: String,
    pub(crate) serialize_as: SerializeAs,
    pub(crate) compute: ComputeFn,
}

impl Computed {
    /// Declares a computed property.
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Model) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            serialize_as: SerializeAs::Default,
            compute: Arc::new(compute),
        }
    }

    /// Sets an explicit serialized name.
    #[must_use]
    pub fn serialize_as(mut self, name: impl Into<String>) -> Self {
        self.serialize_as = SerializeAs::Named(name.into());
        self
    }

    /// Excludes the property from serialized output.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.serialize_as = SerializeAs::Hidden;
        self
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.name)
            .field("serialize_as", &self.serialize_as)
            .finish_non_exhaustive()
    }
}

/// Kind of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Owner has at most one related row holding the foreign key.
    HasOne,
    /// Owner holds the foreign key of one related row.
    BelongsTo,
    /// Owner has many related rows holding the foreign key.
    HasMany,
    /// Owner and related rows are linked through a pivot table.
    ManyToMany,
}

impl RelationKind {
    /// Returns the cardinality of the relation kind.
    #[must_use]
    pub const fn cardinality(self) -> Cardinality {
        match self {
            RelationKind::HasOne | RelationKind::BelongsTo => Cardinality::One,
            RelationKind::HasMany | RelationKind::ManyToMany => Cardinality::Many,
        }
    }
}

/// A relation declaration.
#[derive(Debug, Clone)]
pub struct Relation {
    pub(crate) name: String,
    pub(crate) kind: RelationKind,
    pub(crate) related: String,
    pub(crate) local_key: Option<String>,
    pub(crate) foreign_key: Option<String>,
    pub(crate) serialize_as: SerializeAs,
}

impl Relation {
    fn new(name: impl Into<String>, kind: RelationKind, related: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            related: related.into(),
            local_key: None,
            foreign_key: None,
            serialize_as: SerializeAs::Default,
        }
    }

    /// Declares a has-one relation.
    pub fn has_one(name: impl Into<String>, related: impl Into<String>) -> Self {
        Self::new(name, RelationKind::HasOne, related)
    }

    /// Declares a belongs-to relation.
    pub fn belongs_to(name: impl Into<String>, related: impl Into<String>) -> Self {
        Self::new(name, RelationKind::BelongsTo, related)
    }

    /// Declares a has-many relation.
    pub fn has_many(name: impl Into<String>, related: impl Into<String>) -> Self {
        Self::new(name, RelationKind::HasMany, related)
    }

    /// Declares a many-to-many relation.
    pub fn many_to_many(name: impl Into<String>, related: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToMany, related)
    }

    /// Overrides the local key attribute.
    #[must_use]
    pub fn local_key(mut self, attribute: impl Into<String>) -> Self {
        self.local_key = Some(attribute.into());
        self
    }

    /// Overrides the foreign key attribute.
    #[must_use]
    pub fn foreign_key(mut self, attribute: impl Into<String>) -> Self {
        self.foreign_key = Some(attribute.into());
        self
    }

    /// Sets an explicit serialized name.
    #[must_use]
    pub fn serialize_as(mut self, name: impl Into<String>) -> Self {
        self.serialize_as = SerializeAs::Named(name.into());
        self
    }

    /// Excludes the relation from serialized output.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.serialize_as = SerializeAs::Hidden;
        self
    }
}

/// The declaration of a model type.
///
/// ```
/// use rowkit_core::{Column, ModelDefinition, Relation};
///
/// let user = ModelDefinition::new("User")
///     .column(Column::primary_key("id"))
///     .column(Column::new("username"))
///     .column(Column::new("password").hidden())
///     .relation(Relation::has_one("profile", "Profile"));
/// assert_eq!(user.name(), "User");
/// ```
#[derive(Clone)]
pub struct ModelDefinition {
    pub(crate) name: String,
    pub(crate) extends: Option<String>,
    pub(crate) table: Option<String>,
    pub(crate) self_assign_primary_key: Option<bool>,
    pub(crate) key_generator: Option<KeyGenerator>,
    pub(crate) naming: Option<Arc<dyn NamingStrategy>>,
    pub(crate) extras: Option<ExtrasSerialization>,
    pub(crate) columns: Vec<Column>,
    pub(crate) computed: Vec<Computed>,
    pub(crate) relations: Vec<Relation>,
    pub(crate) hooks: Vec<(HookEvent, Arc<dyn Hook>)>,
}

impl ModelDefinition {
    /// Starts a declaration for the model `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            table: None,
            self_assign_primary_key: None,
            key_generator: None,
            naming: None,
            extras: None,
            columns: Vec::new(),
            computed: Vec::new(),
            relations: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inherits every declaration of the model `parent`.
    #[must_use]
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Sets the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Marks the primary key as assigned by the application.
    #[must_use]
    pub fn self_assign_primary_key(mut self, value: bool) -> Self {
        self.self_assign_primary_key = Some(value);
        self
    }

    /// Generates primary key values on insert when none is set. Implies
    /// self assignment.
    #[must_use]
    pub fn key_generator(mut self, generator: KeyGenerator) -> Self {
        self.key_generator = Some(generator);
        self.self_assign_primary_key = Some(true);
        self
    }

    /// Uses a naming strategy other than the ORM default.
    #[must_use]
    pub fn naming(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = Some(naming);
        self
    }

    /// Controls how the extras bag is serialized.
    #[must_use]
    pub fn serialize_extras(mut self, extras: ExtrasSerialization) -> Self {
        self.extras = Some(extras);
        self
    }

    /// Declares a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Declares a computed property.
    #[must_use]
    pub fn computed(mut self, computed: Computed) -> Self {
        self.computed.push(computed);
        self
    }

    /// Declares a relation.
    #[must_use]
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Registers a hook for `event`. Registering the same hook handle twice
    /// is a no-op.
    #[must_use]
    pub fn hook(mut self, event: HookEvent, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push((event, hook));
        self
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("extends", &self.extends)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("computed", &self.computed)
            .field("relations", &self.relations)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_time_flags_accumulate() {
        let column = Column::new("updatedAt").auto_create().auto_update();
        assert_eq!(
            column.kind,
            ColumnKind::DateTime {
                auto_create: true,
                auto_update: true
            }
        );
    }

    #[test]
    fn relation_cardinality() {
        assert_eq!(RelationKind::HasOne.cardinality(), Cardinality::One);
        assert_eq!(RelationKind::BelongsTo.cardinality(), Cardinality::One);
        assert_eq!(RelationKind::HasMany.cardinality(), Cardinality::Many);
        assert_eq!(RelationKind::ManyToMany.cardinality(), Cardinality::Many);
    }

    #[test]
    fn key_generator_implies_self_assign() {
        let def = ModelDefinition::new("Token").key_generator(KeyGenerator::UuidV4);
        assert_eq!(def.self_assign_primary_key, Some(true));

        let key = KeyGenerator::UuidV4.generate();
        assert_eq!(key.as_text().map(str::len), Some(36));
    }

    #[test]
    fn serialize_as_variants() {
        assert_eq!(Column::new("a").serialize_as, SerializeAs::Default);
        assert_eq!(Column::new("a").hidden().serialize_as, SerializeAs::Hidden);
        assert_eq!(
            Column::new("a").serialize_as("b").serialize_as,
            SerializeAs::Named("b".into())
        );
    }
}
