//! Attribute access, bulk assignment and adapter conversion.

use super::Model;
use crate::adapter::Row;
use crate::error::{CoreError, CoreResult};
use rowkit_value::{Value, ValueMap};
use std::sync::Arc;

enum Assignment {
    Attribute(String, Value),
    Extra(String, Value),
}

/// State restored when a before-hook aborts an operation.
pub(crate) struct Snapshot {
    attributes: ValueMap,
    extras: ValueMap,
    force_update: bool,
    fill_invoked: bool,
}

impl Model {
    /// Reads an attribute or computed property through its accessor.
    ///
    /// Declared columns without a value read as `Undefined`.
    pub fn get(&self, attribute: &str) -> CoreResult<Value> {
        if let Some(column) = self.ty.column(attribute) {
            if let Some(getter) = column.getter() {
                return getter(self, attribute);
            }
            return Ok(self
                .attributes
                .get(attribute)
                .cloned()
                .unwrap_or(Value::Undefined));
        }
        if let Some(computed) = self.ty.computed(attribute) {
            return Ok((computed.compute())(self));
        }
        Err(CoreError::unknown_attribute(self.ty.name(), attribute))
    }

    /// Reads the stored value of an attribute, bypassing accessors.
    pub fn get_raw(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Current attributes.
    pub fn attributes(&self) -> &ValueMap {
        &self.attributes
    }

    /// Attributes as of the last hydration or save.
    pub fn original(&self) -> &ValueMap {
        &self.original
    }

    /// Values that matched no column.
    pub fn extras(&self) -> &ValueMap {
        &self.extras
    }

    /// Stores a value in the extras bag.
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Writes an attribute through its accessor.
    pub fn set(&mut self, attribute: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        let ty = Arc::clone(&self.ty);
        let column = ty
            .column(attribute)
            .ok_or_else(|| CoreError::unknown_attribute(ty.name(), attribute))?;
        match column.setter() {
            Some(setter) => setter(self, attribute, value.into()),
            None => {
                self.write_attribute(attribute, value.into());
                Ok(())
            }
        }
    }

    /// Writes an attribute, bypassing accessors.
    pub fn set_raw(&mut self, attribute: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        if !self.ty.has_column(attribute) {
            return Err(CoreError::unknown_attribute(self.ty.name(), attribute));
        }
        self.write_attribute(attribute, value.into());
        Ok(())
    }

    /// Replaces all attributes with `values`.
    ///
    /// Keys may be attribute or column names. Unknown keys go to extras
    /// when `allow_extras` is set and fail otherwise; every key is checked
    /// before anything is written. Attributes present before the fill and
    /// absent from `values` report as dirty with a null value. A failing
    /// setter leaves the instance as it was.
    pub fn fill(&mut self, values: ValueMap, allow_extras: bool) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        let plan = self.plan(values, allow_extras)?;
        let snapshot = self.snapshot();
        self.attributes.clear();
        self.getter_cache.lock().clear();
        self.fill_invoked = true;
        self.apply_or_restore(plan, snapshot)
    }

    /// Merges `values` into the current attributes.
    ///
    /// Key handling matches [`Model::fill`].
    pub fn merge(&mut self, values: ValueMap, allow_extras: bool) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        let plan = self.plan(values, allow_extras)?;
        let snapshot = self.snapshot();
        self.apply_or_restore(plan, snapshot)
    }

    fn apply_or_restore(&mut self, plan: Vec<Assignment>, snapshot: Snapshot) -> CoreResult<()> {
        let result = self.apply(plan);
        if result.is_err() {
            self.restore(snapshot);
        }
        result
    }

    fn plan(&self, values: ValueMap, allow_extras: bool) -> CoreResult<Vec<Assignment>> {
        values
            .into_iter()
            .map(|(key, value)| {
                let attribute = self.ty.resolve_input_key(&key).map(str::to_string);
                match attribute {
                    Some(attribute) => Ok(Assignment::Attribute(attribute, value)),
                    None if allow_extras => Ok(Assignment::Extra(key, value)),
                    None => Err(CoreError::unknown_attribute(self.ty.name(), key)),
                }
            })
            .collect()
    }

    fn apply(&mut self, plan: Vec<Assignment>) -> CoreResult<()> {
        for assignment in plan {
            match assignment {
                Assignment::Attribute(attribute, value) => self.set(&attribute, value)?,
                Assignment::Extra(key, value) => {
                    self.extras.insert(key, value);
                }
            }
        }
        Ok(())
    }

    /// Takes the current attributes as the new original snapshot.
    pub fn hydrate_original(&mut self) {
        self.original = self.attributes.clone();
        self.fill_invoked = false;
    }

    /// Stores a row returned by the adapter.
    ///
    /// Column keys are mapped to attributes and run through the column's
    /// consume transform; keys matching no column land in extras.
    pub fn consume_adapter_result(&mut self, row: Row) -> CoreResult<()> {
        let ty = Arc::clone(&self.ty);
        for (key, value) in row {
            let column = ty
                .keys()
                .attribute_for_column(&key)
                .and_then(|attribute| ty.column(attribute));
            match column {
                Some(column) => {
                    let value = column.consume_value(ty.name(), value)?;
                    self.write_attribute(column.attribute(), value);
                }
                None => {
                    self.extras.insert(key, value);
                }
            }
        }
        Ok(())
    }

    /// Converts attributes to a column-keyed row for the adapter.
    ///
    /// `Undefined` values are left out.
    pub fn prepare_for_adapter(&self, values: &ValueMap) -> CoreResult<Row> {
        let mut row = Row::new();
        for (attribute, value) in values {
            if value.is_undefined() {
                continue;
            }
            let column = self
                .ty
                .column(attribute)
                .ok_or_else(|| CoreError::unknown_attribute(self.ty.name(), attribute))?;
            let prepared = column.prepare_value(self.ty.name(), value.clone())?;
            row.insert(column.column_name().to_string(), prepared);
        }
        Ok(row)
    }

    /// Returns the cached result of `derive` for an attribute, recomputing
    /// it when the attribute was written since the last call.
    pub(crate) fn cached_attribute(&self, attribute: &str, derive: &dyn Fn(&Value) -> Value) -> Value {
        let version = self.versions.get(attribute).copied().unwrap_or(0);
        let mut cache = self.getter_cache.lock();
        if let Some((cached_version, value)) = cache.get(attribute) {
            if *cached_version == version {
                return value.clone();
            }
        }
        let raw = self
            .attributes
            .get(attribute)
            .cloned()
            .unwrap_or(Value::Undefined);
        let value = derive(&raw);
        cache.insert(attribute.to_string(), (version, value.clone()));
        value
    }

    pub(crate) fn write_attribute(&mut self, attribute: &str, value: Value) {
        self.write_seq += 1;
        self.versions.insert(attribute.to_string(), self.write_seq);
        self.attributes.insert(attribute.to_string(), value);
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            attributes: self.attributes.clone(),
            extras: self.extras.clone(),
            force_update: self.force_update,
            fill_invoked: self.fill_invoked,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        self.attributes = snapshot.attributes;
        self.extras = snapshot.extras;
        self.force_update = snapshot.force_update;
        self.fill_invoked = snapshot.fill_invoked;
        self.getter_cache.lock().clear();
    }
}
