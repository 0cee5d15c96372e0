//! Preloaded relations.

use super::Model;
use crate::error::{CoreError, CoreResult};
use crate::registry::{RelationDefinition, RelationKind};
use crate::types::Cardinality;
use rowkit_value::{Value, ValueMap};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Related instances stored under a relation name.
#[derive(Debug, Clone)]
pub enum Related {
    /// A one-cardinality relation with no related row.
    Null,
    /// A one-cardinality relation.
    One(Box<Model>),
    /// A many-cardinality relation.
    Many(Vec<Model>),
}

impl Related {
    /// Describes the shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Related::Null => "null",
            Related::One(_) => "a single instance",
            Related::Many(_) => "a list",
        }
    }

    /// The single related instance, if any.
    pub fn as_one(&self) -> Option<&Model> {
        match self {
            Related::One(model) => Some(model),
            _ => None,
        }
    }

    /// The related instances of a many-cardinality relation.
    pub fn as_many(&self) -> Option<&[Model]> {
        match self {
            Related::Many(models) => Some(models),
            _ => None,
        }
    }

    /// Whether this is an empty one-cardinality relation.
    pub fn is_null(&self) -> bool {
        matches!(self, Related::Null)
    }

    fn models(&self) -> impl Iterator<Item = &Model> {
        let models: &[Model] = match self {
            Related::Null => &[],
            Related::One(model) => std::slice::from_ref(model.as_ref()),
            Related::Many(models) => models,
        };
        models.iter()
    }
}

impl From<Model> for Related {
    fn from(model: Model) -> Self {
        Related::One(Box::new(model))
    }
}

impl From<Option<Model>> for Related {
    fn from(model: Option<Model>) -> Self {
        model.map_or(Related::Null, Related::from)
    }
}

impl From<Vec<Model>> for Related {
    fn from(models: Vec<Model>) -> Self {
        Related::Many(models)
    }
}

impl Model {
    /// All preloaded relations, keyed by relation name.
    pub fn preloaded(&self) -> &BTreeMap<String, Related> {
        &self.preloaded
    }

    /// A preloaded relation.
    pub fn related(&self, relation: &str) -> Option<&Related> {
        self.preloaded.get(relation)
    }

    /// Replaces the value of a relation.
    ///
    /// One-cardinality relations accept a single instance or null;
    /// many-cardinality relations accept a list.
    pub fn set_related(&mut self, relation: &str, value: impl Into<Related>) -> CoreResult<()> {
        let value = value.into();
        let ty = Arc::clone(&self.ty);
        let definition = ty.relation(relation)?;
        let accepted = matches!(
            (definition.cardinality(), &value),
            (Cardinality::One, Related::One(_) | Related::Null)
                | (Cardinality::Many, Related::Many(_))
        );
        if !accepted {
            return Err(self.cardinality_mismatch(definition, &value));
        }
        self.check_related_types(definition, value.models())?;
        self.preloaded.insert(relation.to_string(), value);
        Ok(())
    }

    /// Appends to a relation.
    ///
    /// Many-cardinality relations extend their list. One-cardinality
    /// relations accept a single instance, which replaces the current one.
    pub fn push_related(&mut self, relation: &str, value: impl Into<Related>) -> CoreResult<()> {
        let value = value.into();
        let ty = Arc::clone(&self.ty);
        let definition = ty.relation(relation)?;
        match (definition.cardinality(), value) {
            (Cardinality::One, value @ (Related::One(_) | Related::Null)) => {
                self.set_related(relation, value)
            }
            (Cardinality::Many, Related::One(model)) => {
                self.extend_related(definition, vec![*model])
            }
            (Cardinality::Many, Related::Many(models)) => self.extend_related(definition, models),
            (_, value) => Err(self.cardinality_mismatch(definition, &value)),
        }
    }

    /// Removes a relation's preloaded value.
    pub fn unset_related(&mut self, relation: &str) -> Option<Related> {
        self.preloaded.remove(relation)
    }

    fn extend_related(
        &mut self,
        definition: &RelationDefinition,
        models: Vec<Model>,
    ) -> CoreResult<()> {
        self.check_related_types(definition, models.iter())?;
        let entry = self
            .preloaded
            .entry(definition.name().to_string())
            .or_insert_with(|| Related::Many(Vec::new()));
        if let Related::Many(existing) = entry {
            existing.extend(models);
        }
        Ok(())
    }

    fn check_related_types<'a>(
        &self,
        definition: &RelationDefinition,
        models: impl IntoIterator<Item = &'a Model>,
    ) -> CoreResult<()> {
        for model in models {
            if !model.model_type().is_a(definition.related()) {
                return Err(CoreError::RelatedTypeMismatch {
                    model: self.ty.name().to_string(),
                    relation: definition.name().to_string(),
                    expected: definition.related().to_string(),
                    received: model.name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn cardinality_mismatch(&self, definition: &RelationDefinition, value: &Related) -> CoreError {
        CoreError::CardinalityMismatch {
            model: self.ty.name().to_string(),
            relation: definition.name().to_string(),
            expected: definition.cardinality().expected_shape(),
            received: value.shape(),
        }
    }

    /// Reads a relation from storage and stores it as preloaded.
    ///
    /// Runs on the instance's bound client and fires the related model's
    /// find or fetch hooks. Many-to-many relations cannot be loaded this
    /// way; attach them with [`Model::set_related`].
    pub async fn load(&mut self, relation: &str) -> CoreResult<&Related> {
        let ty = Arc::clone(&self.ty);
        let definition = ty.relation(relation)?;
        let class = self.orm.model(definition.related())?;
        let keys = definition.keys(&ty, class.model_type());
        let query = class.query().client(self.client().cloned());
        debug!(model = %ty.name(), relation, "loading relation");

        let related = match definition.kind() {
            RelationKind::HasOne => match self.key_value(&keys.local) {
                Some(value) => Related::from(query.where_eq(&keys.foreign, value).first().await?),
                None => Related::Null,
            },
            RelationKind::HasMany => match self.key_value(&keys.local) {
                Some(value) => Related::Many(query.where_eq(&keys.foreign, value).fetch().await?),
                None => Related::Many(Vec::new()),
            },
            RelationKind::BelongsTo => match self.key_value(&keys.foreign) {
                Some(value) => Related::from(query.where_eq(&keys.local, value).first().await?),
                None => Related::Null,
            },
            RelationKind::ManyToMany => {
                return Err(CoreError::invalid_operation(format!(
                    "\"{}.{}\" is many-to-many and can only be attached",
                    ty.name(),
                    relation
                )))
            }
        };

        self.preloaded.insert(relation.to_string(), related);
        self.preloaded
            .get(relation)
            .ok_or_else(|| CoreError::unknown_relation(ty.name(), relation))
    }

    /// Creates a related row through a has-one or has-many relation.
    ///
    /// The foreign key is set from this instance, the new row is saved on
    /// this instance's client and then pushed into the relation.
    pub async fn create_related(&mut self, relation: &str, values: ValueMap) -> CoreResult<Model> {
        let ty = Arc::clone(&self.ty);
        let definition = ty.relation(relation)?;
        if !matches!(definition.kind(), RelationKind::HasOne | RelationKind::HasMany) {
            return Err(CoreError::invalid_operation(format!(
                "cannot create through \"{}.{}\"; only has-one and has-many relations own their rows",
                ty.name(),
                relation
            )));
        }
        let class = self.orm.model(definition.related())?;
        let keys = definition.keys(&ty, class.model_type());
        let owner_key = self
            .key_value(&keys.local)
            .ok_or_else(|| CoreError::MissingPrimaryKey {
                model: ty.name().to_string(),
            })?;

        let mut related = class.new_instance();
        if let Some(client) = self.client().cloned() {
            related.client = Some(client);
        }
        related.merge(values, false)?;
        related.set(&keys.foreign, owner_key)?;
        related.save().await?;
        self.push_related(relation, related.clone())?;
        Ok(related)
    }

    /// Points a belongs-to relation at `related` and saves this instance.
    pub async fn associate(&mut self, relation: &str, related: Model) -> CoreResult<()> {
        let ty = Arc::clone(&self.ty);
        let definition = ty.relation(relation)?;
        if definition.kind() != RelationKind::BelongsTo {
            return Err(CoreError::invalid_operation(format!(
                "\"{}.{}\" is not a belongs-to relation",
                ty.name(),
                relation
            )));
        }
        let keys = definition.keys(&ty, related.model_type());
        let key = related
            .key_value(&keys.local)
            .ok_or_else(|| CoreError::MissingPrimaryKey {
                model: related.name().to_string(),
            })?;
        self.set(&keys.foreign, key)?;
        self.save().await?;
        self.set_related(relation, related)
    }

    fn key_value(&self, attribute: &str) -> Option<Value> {
        self.attributes
            .get(attribute)
            .filter(|value| !value.is_nullish())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::orm;
    use rowkit_value::values;

    #[test]
    fn one_cardinality_rejects_lists() {
        let (orm, _) = orm();
        let users = orm.model("User").unwrap();
        let profiles = orm.model("Profile").unwrap();
        let mut user = users.new_instance();

        let err = user
            .set_related("profile", vec![profiles.new_instance()])
            .unwrap_err();
        assert!(err.to_string().contains("User.profile"));
        assert!(matches!(err, CoreError::CardinalityMismatch { .. }));

        let err = user
            .push_related(
                "profile",
                vec![profiles.new_instance(), profiles.new_instance()],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::CardinalityMismatch { .. }));

        user.set_related("profile", profiles.new_instance()).unwrap();
        user.set_related("profile", None).unwrap();
        assert!(user.related("profile").unwrap().is_null());
    }

    #[test]
    fn many_cardinality_accumulates() {
        let (orm, _) = orm();
        let posts = orm.model("Post").unwrap();
        let mut user = orm.model("User").unwrap().new_instance();

        user.push_related("posts", posts.new_instance()).unwrap();
        user.push_related("posts", vec![posts.new_instance(), posts.new_instance()])
            .unwrap();
        assert_eq!(user.related("posts").unwrap().as_many().unwrap().len(), 3);

        assert!(matches!(
            user.set_related("posts", posts.new_instance()),
            Err(CoreError::CardinalityMismatch { .. })
        ));
        assert!(matches!(
            user.push_related("posts", None),
            Err(CoreError::CardinalityMismatch { .. })
        ));
    }

    #[test]
    fn related_type_is_checked() {
        let (orm, _) = orm();
        let mut user = orm.model("User").unwrap().new_instance();
        let post = orm.model("Post").unwrap().new_instance();
        assert!(matches!(
            user.set_related("profile", post),
            Err(CoreError::RelatedTypeMismatch { .. })
        ));
        assert!(matches!(
            user.set_related("missing", None),
            Err(CoreError::UnknownRelation { .. })
        ));
    }

    #[tokio::test]
    async fn create_related_sets_foreign_key() {
        let (orm, adapter) = orm();
        let mut user = orm
            .model("User")
            .unwrap()
            .create(values! { "username" => "virk" })
            .await
            .unwrap();

        let post = user
            .create_related("posts", values! { "title" => "Hello" })
            .await
            .unwrap();
        assert_eq!(post.get_raw("userId"), user.get_raw("id"));
        assert!(post.is_persisted());
        assert_eq!(user.related("posts").unwrap().as_many().unwrap().len(), 1);
        assert_eq!(adapter.rows("posts").len(), 1);
    }

    #[tokio::test]
    async fn load_reads_relations() {
        let (orm, adapter) = orm();
        adapter.seed("users", values! { "id" => 1, "username" => "virk" });
        adapter.seed("posts", values! { "id" => 10, "userId" => 1, "title" => "a" });
        adapter.seed("posts", values! { "id" => 11, "userId" => 1, "title" => "b" });
        adapter.seed("posts", values! { "id" => 12, "userId" => 2, "title" => "c" });

        let mut user = orm.model("User").unwrap().find(1).await.unwrap().unwrap();
        let posts = user.load("posts").await.unwrap();
        assert_eq!(posts.as_many().unwrap().len(), 2);

        let profile = user.load("profile").await.unwrap();
        assert!(profile.is_null());

        let mut post = orm.model("Post").unwrap().find(12).await.unwrap().unwrap();
        assert!(post.load("author").await.unwrap().is_null());

        let mut post = orm.model("Post").unwrap().find(10).await.unwrap().unwrap();
        let author = post.load("author").await.unwrap().as_one().unwrap();
        assert_eq!(author.get_raw("username"), Some(&Value::from("virk")));
    }
}
