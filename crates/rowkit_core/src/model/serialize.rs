//! Serialization of model instances.
//!
//! Output uses serialized names: column and relation names resolved by
//! the naming strategy or set explicitly, with hidden members left out.
//! Field selectors match serialized names as well.

use super::{Model, Related};
use crate::error::{CoreError, CoreResult};
use crate::registry::ExtrasSerialization;
use rowkit_value::map_to_json;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

/// Picks or omits serialized fields. Omission wins over picking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    pick: Option<Vec<String>>,
    omit: Vec<String>,
}

impl FieldSelector {
    /// Keeps only the named fields.
    pub fn pick<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pick: Some(fields.into_iter().map(Into::into).collect()),
            omit: Vec::new(),
        }
    }

    /// Drops the named fields.
    pub fn omit<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pick: None,
            omit: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds fields to drop.
    #[must_use]
    pub fn and_omit<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Whether a serialized field passes the selector.
    pub fn allows(&self, field: &str) -> bool {
        if self.omit.iter().any(|omitted| omitted == field) {
            return false;
        }
        self.pick
            .as_ref()
            .map_or(true, |picked| picked.iter().any(|p| p == field))
    }
}

/// Field selection for an instance and, by serialized relation name, for
/// its relations.
#[derive(Debug, Clone, Default)]
pub struct CherryPick {
    fields: Option<FieldSelector>,
    relations: BTreeMap<String, CherryPick>,
}

impl CherryPick {
    /// Selects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the instance's own fields.
    #[must_use]
    pub fn fields(mut self, selector: FieldSelector) -> Self {
        self.fields = Some(selector);
        self
    }

    /// Sets the selection for a relation, keyed by its serialized name.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, pick: CherryPick) -> Self {
        self.relations.insert(name.into(), pick);
        self
    }
}

impl Model {
    /// Serializes attributes.
    ///
    /// Values go through getters; hidden columns and `Undefined` values are
    /// skipped. Unless `raw` is set, a column's custom serializer is used.
    pub fn serialize_attributes(
        &self,
        fields: Option<&FieldSelector>,
        raw: bool,
    ) -> CoreResult<Map<String, Json>> {
        let mut out = Map::new();
        for attribute in self.attributes.keys() {
            let Some(column) = self.ty.column(attribute) else {
                continue;
            };
            let Some(name) = column.serialized_name() else {
                continue;
            };
            if fields.is_some_and(|selector| !selector.allows(name)) {
                continue;
            }
            let value = self.get(attribute)?;
            if value.is_undefined() {
                continue;
            }
            let json = match column.serializer() {
                Some(serialize) if !raw => serialize(&value, attribute, self),
                _ => value.to_json(),
            };
            out.insert(name.to_string(), json);
        }
        Ok(out)
    }

    /// Serializes computed properties. `Undefined` results are skipped.
    pub fn serialize_computed(&self, fields: Option<&FieldSelector>) -> Map<String, Json> {
        let mut out = Map::new();
        for computed in self.ty.computed_properties() {
            let Some(name) = computed.serialized_name() else {
                continue;
            };
            if fields.is_some_and(|selector| !selector.allows(name)) {
                continue;
            }
            let value = (computed.compute())(self);
            if !value.is_undefined() {
                out.insert(name.to_string(), value.to_json());
            }
        }
        out
    }

    /// Serializes preloaded relations, recursing with each relation's
    /// selection.
    pub fn serialize_relations(
        &self,
        picks: Option<&BTreeMap<String, CherryPick>>,
    ) -> CoreResult<Map<String, Json>> {
        let mut out = Map::new();
        for (relation, related) in &self.preloaded {
            let definition = self.ty.relation(relation)?;
            let Some(name) = definition.serialized_name() else {
                continue;
            };
            let pick = picks.and_then(|picks| picks.get(name));
            let json = match related {
                Related::Null => Json::Null,
                Related::One(model) => model.serialize(pick)?,
                Related::Many(models) => Json::Array(
                    models
                        .iter()
                        .map(|model| model.serialize(pick))
                        .collect::<CoreResult<_>>()?,
                ),
            };
            out.insert(name.to_string(), json);
        }
        Ok(out)
    }

    /// Preloaded relations keyed by serialized name, unserialized.
    pub fn serialize_relations_raw(&self) -> BTreeMap<String, Related> {
        self.preloaded
            .iter()
            .filter_map(|(relation, related)| {
                let name = self.ty.relation(relation).ok()?.serialized_name()?;
                Some((name.to_string(), related.clone()))
            })
            .collect()
    }

    /// Serializes the instance: attributes, computed properties, relations
    /// and, when the model opts in, extras.
    pub fn serialize(&self, pick: Option<&CherryPick>) -> CoreResult<Json> {
        let fields = pick.and_then(|pick| pick.fields.as_ref());
        let mut out = self.serialize_attributes(fields, false)?;
        out.extend(self.serialize_computed(fields));
        out.extend(self.serialize_relations(pick.map(|pick| &pick.relations))?);
        match self.ty.extras_serialization() {
            ExtrasSerialization::Skip => {}
            ExtrasSerialization::Bag => {
                out.insert(
                    self.orm.config().extras_key.clone(),
                    Json::Object(map_to_json(&self.extras)),
                );
            }
            ExtrasSerialization::Custom(serialize) => out.extend(serialize(self)),
        }
        Ok(Json::Object(out))
    }

    /// Serializes the whole instance.
    pub fn to_json(&self) -> CoreResult<Json> {
        self.serialize(None)
    }

    /// A plain object keyed by attribute names.
    ///
    /// Includes hidden columns, computed values, relations and the extras
    /// bag under `$extras`. Accessors are applied; `Undefined` is dropped.
    pub fn to_object(&self) -> CoreResult<Json> {
        let mut out = Map::new();
        for attribute in self.attributes.keys() {
            let value = self.get(attribute)?;
            if !value.is_undefined() {
                out.insert(attribute.clone(), value.to_json());
            }
        }
        for computed in self.ty.computed_properties() {
            let value = (computed.compute())(self);
            if !value.is_undefined() {
                out.insert(computed.name().to_string(), value.to_json());
            }
        }
        for (relation, related) in &self.preloaded {
            let json = match related {
                Related::Null => Json::Null,
                Related::One(model) => model.to_object()?,
                Related::Many(models) => Json::Array(
                    models
                        .iter()
                        .map(Model::to_object)
                        .collect::<CoreResult<_>>()?,
                ),
            };
            out.insert(relation.clone(), json);
        }
        out.insert("$extras".to_string(), Json::Object(map_to_json(&self.extras)));
        Ok(Json::Object(out))
    }

    /// Deserializes the serialized form into a typed value.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> CoreResult<T> {
        serde_json::from_value(self.to_json()?).map_err(|err| {
            CoreError::invalid_operation(format!(
                "cannot deserialize \"{}\": {err}",
                self.ty.name()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::orm;
    use crate::registry::{Column, ExtrasSerialization, ModelDefinition};
    use rowkit_value::{values, Value};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn user(orm: &crate::Orm) -> Model {
        orm.model("User")
            .unwrap()
            .hydrate(values! {
                "id" => 1,
                "username" => "virk",
                "password" => "secret",
                "fullName" => "Harminder Virk",
                "email_address" => "virk@example.com",
            })
            .unwrap()
    }

    #[test]
    fn hidden_and_renamed_columns() {
        let (orm, _) = orm();
        let json = user(&orm).to_json().unwrap();
        assert_eq!(
            json,
            json!({
                "id": 1,
                "username": "virk",
                "email": "virk@example.com",
                "full_name": "Harminder Virk",
                "handle": "@virk",
            })
        );
    }

    #[test]
    fn pick_and_omit_use_serialized_names() {
        let (orm, _) = orm();
        let user = user(&orm);

        let picked = user
            .serialize(Some(&CherryPick::new().fields(FieldSelector::pick([
                "username",
                "full_name",
                "password",
            ]))))
            .unwrap();
        assert_eq!(
            picked,
            json!({ "username": "virk", "full_name": "Harminder Virk" })
        );

        let omitted = user
            .serialize(Some(&CherryPick::new().fields(
                FieldSelector::pick(["id", "username"]).and_omit(["username"]),
            )))
            .unwrap();
        assert_eq!(omitted, json!({ "id": 1 }));
    }

    #[test]
    fn undefined_values_are_skipped() {
        let (orm, _) = orm();
        let mut user = orm.model("User").unwrap().new_instance();
        user.merge(values! { "username" => Value::Undefined, "points" => 3 }, false)
            .unwrap();
        assert_eq!(user.to_json().unwrap(), json!({ "points": 3 }));
    }

    #[test]
    fn relations_serialize_recursively() {
        let (orm, _) = orm();
        let mut user = user(&orm);
        let post = orm
            .model("Post")
            .unwrap()
            .hydrate(values! { "id" => 5, "userId" => 1, "title" => "Hello" })
            .unwrap();
        user.set_related("posts", vec![post]).unwrap();
        user.set_related("profile", None).unwrap();

        let pick = CherryPick::new()
            .fields(FieldSelector::pick(["id"]))
            .relation(
                "posts",
                CherryPick::new().fields(FieldSelector::omit(["userId"])),
            );
        assert_eq!(
            user.serialize(Some(&pick)).unwrap(),
            json!({
                "id": 1,
                "posts": [{ "id": 5, "title": "Hello" }],
                "profile": null,
            })
        );

        let raw = user.serialize_relations_raw();
        assert!(raw["profile"].is_null());
        assert_eq!(raw["posts"].as_many().unwrap().len(), 1);
    }

    #[test]
    fn custom_serializer_is_skipped_in_raw_mode() {
        let (orm, _) = orm();
        orm.define(
            ModelDefinition::new("Secret")
                .column(Column::primary_key("id"))
                .column(
                    Column::new("token")
                        .serialize_with(|value, _, _| json!(format!("***{}", value.key_string()))),
                ),
        )
        .unwrap();
        let secret = orm
            .model("Secret")
            .unwrap()
            .hydrate(values! { "id" => 1, "token" => "abc" })
            .unwrap();

        let cooked = secret.serialize_attributes(None, false).unwrap();
        assert_eq!(cooked["token"], json!("***abc"));
        let raw = secret.serialize_attributes(None, true).unwrap();
        assert_eq!(raw["token"], json!("abc"));
    }

    #[test]
    fn extras_bag_and_custom_extras() {
        let (orm, _) = orm();
        orm.define(
            ModelDefinition::new("Stat")
                .column(Column::primary_key("id"))
                .serialize_extras(ExtrasSerialization::Bag),
        )
        .unwrap();
        orm.define(
            ModelDefinition::new("Tally")
                .column(Column::primary_key("id"))
                .serialize_extras(ExtrasSerialization::Custom(Arc::new(|model: &Model| {
                    let mut out = Map::new();
                    out.insert("extraCount".into(), json!(model.extras().len()));
                    out
                }))),
        )
        .unwrap();

        let stat = orm
            .model("Stat")
            .unwrap()
            .hydrate(values! { "id" => 1, "total" => 9 })
            .unwrap();
        assert_eq!(stat.to_json().unwrap(), json!({ "id": 1, "meta": { "total": 9 } }));

        let tally = orm
            .model("Tally")
            .unwrap()
            .hydrate(values! { "id" => 1, "a" => 1, "b" => 2 })
            .unwrap();
        assert_eq!(tally.to_json().unwrap(), json!({ "id": 1, "extraCount": 2 }));
    }

    #[test]
    fn to_object_uses_attribute_names() {
        let (orm, _) = orm();
        let object = user(&orm).to_object().unwrap();
        assert_eq!(object["fullName"], json!("Harminder Virk"));
        assert_eq!(object["email"], json!("virk@example.com"));
        assert_eq!(object["password"], json!("secret"));
        assert_eq!(object["handle"], json!("@virk"));
        assert_eq!(object["$extras"], json!({}));
    }

    #[test]
    fn deserialize_into_typed_value() {
        #[derive(Deserialize)]
        struct UserView {
            id: i64,
            username: String,
            full_name: String,
        }

        let (orm, _) = orm();
        let view: UserView = user(&orm).deserialize_into().unwrap();
        assert_eq!(view.id, 1);
        assert_eq!(view.username, "virk");
        assert_eq!(view.full_name, "Harminder Virk");
    }
}
