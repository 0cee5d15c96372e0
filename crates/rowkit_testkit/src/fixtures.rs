//! Test fixtures and ORM helpers.
//!
//! Provides an ORM wired to a fresh [`MemoryAdapter`] and a small blog
//! schema used across the integration tests.

use rowkit_core::{
    Adapter, Column, Computed, CoreResult, ModelClass, ModelDefinition, Orm, OrmConfig, Relation,
};
use rowkit_memory::MemoryAdapter;
use rowkit_value::Value;
use std::sync::Arc;

/// An ORM over its own in-memory adapter.
pub struct TestOrm {
    /// The ORM instance.
    pub orm: Orm,
    /// The adapter behind it, for inspecting stored rows and counters.
    pub adapter: Arc<MemoryAdapter>,
}

impl TestOrm {
    /// Creates an ORM with no models defined.
    pub fn new() -> Self {
        Self::with_config(OrmConfig::default())
    }

    /// Creates an ORM with a custom configuration and no models defined.
    pub fn with_config(config: OrmConfig) -> Self {
        let adapter = Arc::new(MemoryAdapter::new());
        let orm = Orm::with_config(Arc::clone(&adapter) as Arc<dyn Adapter>, config);
        Self { orm, adapter }
    }

    /// Creates an ORM with the blog schema defined.
    pub fn blog() -> Self {
        let db = Self::new();
        define_blog(&db.orm).expect("Blog schema must register");
        db
    }

    /// Registers a definition, panicking on failure.
    pub fn define(&self, definition: ModelDefinition) {
        self.orm
            .define(definition)
            .expect("Failed to define model");
    }

    /// Class handle for a defined model, panicking on failure.
    pub fn class(&self, name: &str) -> ModelClass {
        self.orm.model(name).expect("Failed to boot model")
    }

    /// Rows stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<rowkit_core::Row> {
        self.adapter.rows(table)
    }
}

impl Default for TestOrm {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestOrm {
    type Target = Orm;

    fn deref(&self) -> &Self::Target {
        &self.orm
    }
}

/// `User`: users with a profile, posts and skills.
///
/// `email` is stored in `email_address`, `password` is never serialized
/// and both timestamps are maintained automatically.
pub fn user_definition() -> ModelDefinition {
    ModelDefinition::new("User")
        .table("users")
        .column(Column::primary_key("id"))
        .column(Column::new("username"))
        .column(Column::new("email").column_name("email_address"))
        .column(Column::new("password").hidden())
        .column(Column::new("points"))
        .column(Column::new("createdAt").date_time().auto_create())
        .column(
            Column::new("updatedAt")
                .date_time()
                .auto_create()
                .auto_update(),
        )
        .computed(Computed::new("handle", |user| {
            match user.get_raw("username").and_then(Value::as_text) {
                Some(name) => Value::from(format!("@{name}")),
                None => Value::Undefined,
            }
        }))
        .relation(Relation::has_one("profile", "Profile"))
        .relation(Relation::has_many("posts", "Post"))
        .relation(Relation::many_to_many("skills", "Skill"))
}

/// `Profile`: one per user.
pub fn profile_definition() -> ModelDefinition {
    ModelDefinition::new("Profile")
        .table("profiles")
        .column(Column::primary_key("id"))
        .column(Column::new("userId"))
        .column(Column::new("bio"))
        .relation(Relation::belongs_to("user", "User"))
}

/// `Post`: written by a user.
pub fn post_definition() -> ModelDefinition {
    ModelDefinition::new("Post")
        .table("posts")
        .column(Column::primary_key("id"))
        .column(Column::new("userId"))
        .column(Column::new("title"))
        .relation(Relation::belongs_to("author", "User").foreign_key("userId"))
}

/// `Skill`: attached to users through a pivot the adapter does not model.
pub fn skill_definition() -> ModelDefinition {
    ModelDefinition::new("Skill")
        .table("skills")
        .column(Column::primary_key("id"))
        .column(Column::new("name"))
}

/// Defines `User`, `Profile`, `Post` and `Skill` on `orm`.
pub fn define_blog(orm: &Orm) -> CoreResult<()> {
    for definition in [
        user_definition(),
        profile_definition(),
        post_definition(),
        skill_definition(),
    ] {
        orm.define(definition)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blog_models_boot() {
        let db = TestOrm::blog();
        for name in ["User", "Profile", "Post", "Skill"] {
            assert!(db.model(name).is_ok(), "{name} should boot");
        }
        let users = db.class("User");
        assert_eq!(users.model_type().column_name("email").unwrap(), "email_address");
        assert_eq!(users.model_type().table(), "users");
    }

    #[tokio::test]
    async fn adapter_is_shared() {
        let db = TestOrm::blog();
        db.class("Skill")
            .create(rowkit_value::values! { "name" => "rust" })
            .await
            .unwrap();
        assert_eq!(db.rows("skills").len(), 1);
        assert_eq!(db.adapter.stats().inserts(), 1);
    }
}
