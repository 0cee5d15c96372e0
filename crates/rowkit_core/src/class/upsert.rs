//! Lookup-then-write operations.
//!
//! Lookups issued here skip find and fetch hooks so a scope added by a
//! read hook cannot hide the row that is about to be written. Save hooks
//! fire as usual.

use super::ModelClass;
use crate::adapter::ManagedTransaction;
use crate::error::{CoreError, CoreResult};
use crate::model::Model;
use rowkit_value::{Value, ValueMap};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

impl ModelClass {
    async fn lookup(&self, search: &ValueMap, lock: bool) -> CoreResult<Option<Model>> {
        let mut query = self.query().without_hooks().where_all(search);
        if lock {
            query = query.for_update();
        }
        query.first().await
    }

    /// Returns the first match for `search`, or a new unsaved instance
    /// filled with `search` and then `save`.
    pub async fn first_or_new(&self, search: ValueMap, save: ValueMap) -> CoreResult<Model> {
        if let Some(found) = self.lookup(&search, false).await? {
            return Ok(found);
        }
        let mut model = self.new_instance();
        model.merge(search, false)?;
        model.merge(save, false)?;
        Ok(model)
    }

    /// Like [`ModelClass::first_or_new`], saving the instance on a miss.
    pub async fn first_or_create(&self, search: ValueMap, save: ValueMap) -> CoreResult<Model> {
        let mut model = self.first_or_new(search, save).await?;
        if model.is_new() {
            model.save().await?;
        }
        Ok(model)
    }

    /// Updates the row matching `search` with `update`, or creates it.
    ///
    /// The lookup locks the matched row inside a transaction that also
    /// covers the save, so concurrent calls for the same row run one after
    /// the other. A bound transaction is reused; otherwise one is opened
    /// and committed here.
    pub async fn update_or_create(&self, search: ValueMap, update: ValueMap) -> CoreResult<Model> {
        let managed = ManagedTransaction::open(self.orm.adapter().as_ref(), self.client()).await?;
        let class = self.clone().use_transaction(Arc::clone(managed.handle()));
        let result = async {
            let mut model = match class.lookup(&search, true).await? {
                Some(mut found) => {
                    found.merge(update, false)?;
                    found
                }
                None => {
                    let mut created = class.new_instance();
                    created.merge(search, false)?;
                    created.merge(update, false)?;
                    created
                }
            };
            model.save().await?;
            Ok::<_, CoreError>(model)
        }
        .await;
        managed.finish(result).await
    }

    /// For each row, returns the existing instance matching its `keys` or
    /// creates one. Existing rows are not modified.
    ///
    /// Every row must carry a non-null value for every key attribute. All
    /// writes share one transaction. Results follow the order of `rows`.
    pub async fn fetch_or_create_many(
        &self,
        keys: &[&str],
        rows: Vec<ValueMap>,
    ) -> CoreResult<Vec<Model>> {
        self.upsert_many(keys, rows, false).await
    }

    /// For each row, merges it into the existing instance matching its
    /// `keys` and saves, or creates a new instance.
    ///
    /// Matched rows are locked for the duration of the shared transaction.
    pub async fn update_or_create_many(
        &self,
        keys: &[&str],
        rows: Vec<ValueMap>,
    ) -> CoreResult<Vec<Model>> {
        self.upsert_many(keys, rows, true).await
    }

    async fn upsert_many(
        &self,
        keys: &[&str],
        rows: Vec<ValueMap>,
        update: bool,
    ) -> CoreResult<Vec<Model>> {
        if keys.is_empty() {
            return Err(CoreError::invalid_operation(format!(
                "batch upsert on \"{}\" needs at least one key attribute",
                self.name()
            )));
        }
        self.check_key_values(keys, &rows)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let managed = ManagedTransaction::open(self.orm.adapter().as_ref(), self.client()).await?;
        let class = self.clone().use_transaction(Arc::clone(managed.handle()));
        let result = async {
            let mut query = class.query().without_hooks();
            for key in keys {
                let values: Vec<Value> = rows
                    .iter()
                    .filter_map(|row| row.get(*key).cloned())
                    .collect();
                query = query.where_in(key, values);
            }
            if update {
                query = query.for_update();
            }

            let mut existing: HashMap<String, Model> = HashMap::new();
            for model in query.fetch().await? {
                let lookup = class.lookup_key(keys, |key| model.get_raw(key).cloned());
                existing.entry(lookup).or_insert(model);
            }
            debug!(
                model = %class.name(),
                rows = rows.len(),
                matched = existing.len(),
                "batch upsert"
            );

            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let lookup = class.lookup_key(keys, |key| row.get(key).cloned());
                let model = match existing.remove(&lookup) {
                    Some(mut found) => {
                        if update {
                            found.merge(row, false)?;
                            found.save().await?;
                        }
                        found
                    }
                    None => {
                        let mut created = class.new_instance();
                        created.merge(row, false)?;
                        created.save().await?;
                        created
                    }
                };
                existing.insert(lookup, model.clone());
                out.push(model);
            }
            Ok::<_, CoreError>(out)
        }
        .await;
        managed.finish(result).await
    }

    fn check_key_values(&self, keys: &[&str], rows: &[ValueMap]) -> CoreResult<()> {
        for (index, row) in rows.iter().enumerate() {
            for key in keys {
                if row.get(*key).map_or(true, Value::is_nullish) {
                    return Err(CoreError::MissingKeyValue {
                        model: self.name().to_string(),
                        attribute: (*key).to_string(),
                        row: index,
                    });
                }
            }
        }
        Ok(())
    }

    fn lookup_key(&self, keys: &[&str], value_of: impl Fn(&str) -> Option<Value>) -> String {
        let fold_case = self.orm.config().case_insensitive_keys;
        keys.iter()
            .map(|key| match value_of(key) {
                Some(Value::Text(text)) if fold_case => {
                    Value::Text(text.to_lowercase()).group_key()
                }
                Some(value) => value.group_key(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}
