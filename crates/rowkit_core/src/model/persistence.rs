//! Save, delete and refresh.

use super::attributes::Snapshot;
use super::Model;
use crate::adapter::RowTarget;
use crate::error::{CoreError, CoreResult};
use crate::hooks::{run_model_hooks, HookEvent};
use crate::registry::{ColumnKind, ModelType};
use rowkit_value::{Value, ValueMap};
use std::sync::Arc;
use tracing::{debug, trace};

impl Model {
    /// Persists the instance.
    ///
    /// New instances are inserted; persisted ones are updated with their
    /// dirty attributes, addressed by the primary key they were loaded
    /// with. A persisted instance with nothing dirty and force-update off
    /// makes no adapter call. If a before-hook fails, attributes and extras
    /// are restored to their state before the save, including any primary
    /// key generated for it.
    pub async fn save(&mut self) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        let ty = Arc::clone(&self.ty);
        if self.persisted {
            self.update_row(&ty).await
        } else {
            self.insert_row(&ty).await
        }
    }

    async fn insert_row(&mut self, ty: &ModelType) -> CoreResult<()> {
        let snapshot = self.snapshot();
        if ty.self_assigns_primary_key() && self.primary_key_value().map_or(true, Value::is_null) {
            if let Some(generator) = ty.key_generator() {
                self.write_attribute(ty.primary_key(), generator.generate());
            }
        }

        self.run_before_hooks(ty, &[HookEvent::BeforeCreate, HookEvent::BeforeSave], snapshot)
            .await?;
        self.touch_timestamps(ty, true);

        let payload = self.prepare_for_adapter(&self.attributes)?;
        let key = self
            .primary_key_value()
            .cloned()
            .unwrap_or(Value::Undefined);
        let target = self.row_target(ty, key);
        debug!(model = %ty.name(), table = %ty.table(), "inserting row");
        let adapter = Arc::clone(self.orm.adapter());
        let row = adapter.insert(&target, payload).await?;

        self.consume_adapter_result(row)?;
        self.hydrate_original();
        self.persisted = true;
        self.force_update = false;

        run_model_hooks(ty, HookEvent::AfterCreate, self).await?;
        run_model_hooks(ty, HookEvent::AfterSave, self).await
    }

    async fn update_row(&mut self, ty: &ModelType) -> CoreResult<()> {
        let snapshot = self.snapshot();
        self.run_before_hooks(ty, &[HookEvent::BeforeUpdate, HookEvent::BeforeSave], snapshot)
            .await?;

        if self.force_update || self.is_dirty() {
            self.touch_timestamps(ty, false);
            let payload = self.prepare_for_adapter(&self.dirty())?;
            let key = self.persisted_key(ty)?;
            let target = self.row_target(ty, key);
            debug!(
                model = %ty.name(),
                table = %ty.table(),
                columns = payload.len(),
                "updating row"
            );
            let adapter = Arc::clone(self.orm.adapter());
            let row = adapter.update(&target, payload).await?;
            self.consume_adapter_result(row)?;
            self.hydrate_original();
            self.force_update = false;
        } else {
            trace!(model = %ty.name(), "nothing to update");
        }

        run_model_hooks(ty, HookEvent::AfterUpdate, self).await?;
        run_model_hooks(ty, HookEvent::AfterSave, self).await
    }

    /// Deletes the row. The instance is frozen afterwards: mutation and
    /// persistence fail with [`CoreError::DeletedInstance`].
    pub async fn delete(&mut self) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        if !self.persisted {
            return Err(CoreError::invalid_operation(format!(
                "cannot delete an unpersisted \"{}\" instance",
                self.ty.name()
            )));
        }
        let ty = Arc::clone(&self.ty);
        let snapshot = self.snapshot();
        self.run_before_hooks(&ty, &[HookEvent::BeforeDelete], snapshot)
            .await?;

        let key = self.persisted_key(&ty)?;
        let target = self.row_target(&ty, key);
        debug!(model = %ty.name(), table = %ty.table(), "deleting row");
        let adapter = Arc::clone(self.orm.adapter());
        adapter.delete(&target).await?;
        self.deleted = true;

        run_model_hooks(&ty, HookEvent::AfterDelete, self).await
    }

    /// Re-reads the row and replaces the attributes with its values.
    ///
    /// Unpersisted instances are left as they are. Fails with
    /// [`CoreError::RowNotFound`] when the row no longer exists.
    pub async fn refresh(&mut self) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        if !self.persisted {
            return Ok(());
        }
        let ty = Arc::clone(&self.ty);
        let key = self.persisted_key(&ty)?;
        let fresh = self
            .class()
            .query()
            .where_eq(ty.primary_key(), key.clone())
            .first()
            .await?
            .ok_or_else(|| {
                CoreError::row_not_found(ty.table(), ty.primary_column(), key.key_string())
            })?;

        self.attributes.clear();
        self.getter_cache.lock().clear();
        for (attribute, value) in fresh.attributes {
            self.write_attribute(&attribute, value);
        }
        self.hydrate_original();
        Ok(())
    }

    /// Runs before-hooks, rolling the instance back to `snapshot` when one
    /// fails.
    async fn run_before_hooks(
        &mut self,
        ty: &ModelType,
        events: &[HookEvent],
        snapshot: Snapshot,
    ) -> CoreResult<()> {
        for event in events {
            if let Err(err) = run_model_hooks(ty, *event, self).await {
                self.restore(snapshot);
                return Err(err);
            }
        }
        Ok(())
    }

    fn touch_timestamps(&mut self, ty: &ModelType, inserting: bool) {
        let dirty = if inserting {
            ValueMap::new()
        } else {
            self.dirty()
        };
        let targets: Vec<String> = ty
            .columns()
            .filter(|column| match column.kind() {
                ColumnKind::DateTime {
                    auto_create,
                    auto_update,
                } if inserting => {
                    (auto_create || auto_update)
                        && self
                            .attributes
                            .get(column.attribute())
                            .map_or(true, Value::is_nullish)
                }
                ColumnKind::DateTime { auto_update, .. } => {
                    auto_update && !dirty.contains_key(column.attribute())
                }
                _ => false,
            })
            .map(|column| column.attribute().to_string())
            .collect();

        if targets.is_empty() {
            return;
        }
        let now = Value::now();
        for attribute in targets {
            self.write_attribute(&attribute, now.clone());
        }
    }

    fn persisted_key(&self, ty: &ModelType) -> CoreResult<Value> {
        let readable = |value: &&Value| !value.is_nullish();
        self.original
            .get(ty.primary_key())
            .filter(readable)
            .or_else(|| self.attributes.get(ty.primary_key()).filter(readable))
            .cloned()
            .ok_or_else(|| CoreError::MissingPrimaryKey {
                model: ty.name().to_string(),
            })
    }

    fn row_target(&self, ty: &ModelType, key: Value) -> RowTarget {
        RowTarget {
            model: ty.name().to_string(),
            table: ty.table().to_string(),
            primary_column: ty.primary_column().to_string(),
            primary_value: key,
            client: self.client().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::AdapterCall;
    use crate::hooks::{model_hook, HookEvent};
    use crate::model::test_support::orm;
    use crate::registry::{Column, KeyGenerator, ModelDefinition};
    use crate::CoreError;
    use rowkit_value::{values, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn second_save_without_changes_writes_nothing() {
        let (orm, adapter) = orm();
        let mut user = orm.model("User").unwrap().new_instance();
        user.set("username", "virk").unwrap();

        user.save().await.unwrap();
        assert!(user.is_persisted());
        assert_eq!(user.get_raw("id"), Some(&Value::Integer(1)));
        assert!(!user.is_dirty());

        user.save().await.unwrap();
        assert_eq!(adapter.write_count(), 1);

        user.enable_force_update();
        user.save().await.unwrap();
        assert_eq!(adapter.update_count(), 1);
    }

    #[tokio::test]
    async fn update_sends_only_dirty_columns() {
        let (orm, adapter) = orm();
        adapter.seed(
            "users",
            values! { "id" => 1, "username" => "virk", "email_address" => "a@b.c" },
        );
        let mut user = orm.model("User").unwrap().find(1).await.unwrap().unwrap();
        user.set("email", "x@y.z").unwrap();
        user.save().await.unwrap();

        let update = adapter
            .calls()
            .into_iter()
            .find(|call| matches!(call, AdapterCall::Update { .. }))
            .unwrap();
        assert_eq!(
            update,
            AdapterCall::Update {
                table: "users".into(),
                key: Value::Integer(1),
                values: values! { "email_address" => "x@y.z" },
            }
        );
    }

    #[tokio::test]
    async fn changed_primary_key_updates_the_old_row() {
        let (orm, adapter) = orm();
        adapter.seed("users", values! { "id" => 1, "username" => "virk" });
        let mut user = orm.model("User").unwrap().find(1).await.unwrap().unwrap();

        user.set("id", 2).unwrap();
        user.save().await.unwrap();

        let rows = adapter.rows("users");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::Integer(2));
        assert_eq!(user.original()["id"], Value::Integer(2));
    }

    #[tokio::test]
    async fn aborting_hook_restores_state_and_skips_adapter() {
        let (orm, adapter) = orm();
        let mut guarded = orm.model("Guarded").unwrap().new_instance();
        guarded.set("name", "original").unwrap();

        let err = guarded.save().await.unwrap_err();
        assert!(matches!(err, CoreError::HookAbort { .. }));
        assert_eq!(guarded.get_raw("name"), Some(&Value::from("original")));
        assert!(!guarded.is_persisted());
        assert_eq!(adapter.write_count(), 0);
    }

    #[tokio::test]
    async fn aborted_insert_discards_the_generated_key() {
        let (orm, adapter) = orm();
        orm.define(
            ModelDefinition::new("Token")
                .column(Column::primary_key("id"))
                .column(Column::new("label"))
                .key_generator(KeyGenerator::UuidV4)
                .hook(
                    HookEvent::BeforeCreate,
                    model_hook(|_| Err(CoreError::hook_abort("closed"))),
                ),
        )
        .unwrap();
        let mut token = orm.model("Token").unwrap().new_instance();
        token.set("label", "api").unwrap();
        token.hydrate_original();

        let err = token.save().await.unwrap_err();
        assert!(matches!(err, CoreError::HookAbort { .. }));
        assert!(token.primary_key_value().is_none());
        assert!(!token.is_dirty());
        assert_eq!(adapter.write_count(), 0);
    }

    #[tokio::test]
    async fn hooks_run_in_order() {
        let (orm, _) = orm();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut definition = ModelDefinition::new("Audited").column(Column::primary_key("id"));
        for event in [
            HookEvent::BeforeCreate,
            HookEvent::BeforeSave,
            HookEvent::AfterCreate,
            HookEvent::AfterSave,
            HookEvent::BeforeUpdate,
            HookEvent::AfterUpdate,
        ] {
            let order = Arc::clone(&order);
            definition = definition.hook(
                event,
                model_hook(move |_| {
                    order.lock().push(event.as_str());
                    Ok(())
                }),
            );
        }
        orm.define(definition).unwrap();

        let mut audited = orm.model("Audited").unwrap().new_instance();
        audited.save().await.unwrap();
        audited.save().await.unwrap();

        assert_eq!(
            *order.lock(),
            vec![
                "before:create",
                "before:save",
                "after:create",
                "after:save",
                "before:update",
                "before:save",
                "after:update",
                "after:save",
            ]
        );
    }

    #[tokio::test]
    async fn deleted_instances_are_frozen() {
        let (orm, adapter) = orm();
        let mut user = orm
            .model("User")
            .unwrap()
            .create(values! { "username" => "virk" })
            .await
            .unwrap();
        user.delete().await.unwrap();

        assert!(user.is_deleted());
        assert!(adapter.rows("users").is_empty());
        assert!(matches!(
            user.set("username", "x"),
            Err(CoreError::DeletedInstance { .. })
        ));
        assert!(matches!(
            user.save().await,
            Err(CoreError::DeletedInstance { .. })
        ));
    }

    #[tokio::test]
    async fn refresh_of_vanished_row_fails() {
        let (orm, adapter) = orm();
        let mut user = orm
            .model("User")
            .unwrap()
            .create(values! { "username" => "virk" })
            .await
            .unwrap();
        adapter.seed("users", values! { "id" => 99 });

        user.set("username", "local change").unwrap();
        user.refresh().await.unwrap();
        assert_eq!(user.get_raw("username"), Some(&Value::from("virk")));
        assert!(!user.is_dirty());

        let mut doomed = orm.model("User").unwrap().find(99).await.unwrap().unwrap();
        orm.model("User")
            .unwrap()
            .find(99)
            .await
            .unwrap()
            .unwrap()
            .delete()
            .await
            .unwrap();
        assert!(matches!(
            doomed.refresh().await,
            Err(CoreError::RowNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn timestamps_and_generated_keys() {
        let (orm, _) = orm();
        orm.define(
            ModelDefinition::new("Token")
                .key_generator(KeyGenerator::UuidV4)
                .column(Column::primary_key("id"))
                .column(Column::new("label"))
                .column(Column::new("createdAt").auto_create())
                .column(Column::new("updatedAt").auto_create().auto_update()),
        )
        .unwrap();

        let mut token = orm
            .model("Token")
            .unwrap()
            .create(values! { "label" => "a" })
            .await
            .unwrap();
        assert_eq!(token.get_raw("id").and_then(Value::as_text).map(str::len), Some(36));
        let created = token.get_raw("createdAt").cloned().unwrap();
        assert!(created.as_datetime().is_some());
        assert!(token.get_raw("updatedAt").unwrap().as_datetime().is_some());

        token.set("label", "b").unwrap();
        token.save().await.unwrap();
        assert_eq!(token.get_raw("createdAt"), Some(&created));
    }

    #[tokio::test]
    async fn failing_after_hook_leaves_row_persisted() {
        let (orm, adapter) = orm();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        orm.define(
            ModelDefinition::new("Noisy")
                .column(Column::primary_key("id"))
                .hook(
                    HookEvent::AfterCreate,
                    model_hook(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(CoreError::hook_abort("after create"))
                    }),
                ),
        )
        .unwrap();

        let mut noisy = orm.model("Noisy").unwrap().new_instance();
        assert!(noisy.save().await.is_err());
        assert!(noisy.is_persisted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.rows("noisy").len(), 1);
    }
}
