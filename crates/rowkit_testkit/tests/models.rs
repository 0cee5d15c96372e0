//! Inheritance, relations and serialization over the blog schema.

use rowkit_core::{
    model_hook, CherryPick, Column, CoreError, FieldSelector, HookEvent, ModelDefinition, Related,
};
use rowkit_testkit::prelude::*;
use rowkit_value::Value;
use serde::Deserialize;
use serde_json::json;

fn admin_definition() -> ModelDefinition {
    ModelDefinition::new("Admin")
        .extends("User")
        .column(Column::new("role"))
        .hook(
            HookEvent::BeforeCreate,
            model_hook(|admin| admin.set("role", "owner")),
        )
}

#[tokio::test]
async fn subtypes_do_not_leak_into_their_parent() {
    let db = TestOrm::blog();
    db.define(admin_definition());
    let users = db.class("User");
    let admins = db.class("Admin");

    assert!(admins.model_type().has_column("role"));
    assert!(!users.model_type().has_column("role"));
    assert_eq!(admins.model_type().table(), "users");
    assert!(admins.model_type().is_a("User"));
    assert!(!users.model_type().is_a("Admin"));

    let admin = admins
        .create(values! { "username" => "virk" })
        .await
        .unwrap();
    let user = users
        .create(values! { "username" => "romain" })
        .await
        .unwrap();
    assert_eq!(admin.get("role").unwrap(), Value::from("owner"));
    assert!(admin.get("createdAt").unwrap().as_datetime().is_some());
    assert!(user.get_raw("role").is_none());
    assert!(!db.rows("users")[1].contains_key("role"));
}

#[test]
fn definitions_are_replaceable_until_booted() {
    let db = TestOrm::blog();
    db.define(user_definition().table("members"));
    db.define(admin_definition());
    assert_eq!(db.class("Admin").model_type().table(), "members");

    let err = db.orm.define(user_definition()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation { .. }));
    assert_eq!(db.class("User").model_type().table(), "members");
}

#[tokio::test]
async fn serialization_uses_serialized_names_and_skips_hidden_columns() {
    let db = TestOrm::blog();
    let user = db
        .class("User")
        .create(values! {
            "username" => "virk",
            "email" => "virk@example.com",
            "password" => "secret",
        })
        .await
        .unwrap();

    let out = user.to_json().unwrap();
    assert_eq!(out["email"], json!("virk@example.com"));
    assert_eq!(out["handle"], json!("@virk"));
    assert!(out.get("password").is_none());
    assert!(out.get("email_address").is_none());

    let object = user.to_object().unwrap();
    assert_eq!(object["password"], json!("secret"));
    assert!(object.get("$extras").is_some());
}

#[tokio::test]
async fn serialized_output_deserializes_into_typed_views() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct UserView {
        username: String,
        handle: String,
        points: Option<i64>,
    }

    let db = TestOrm::blog();
    let user = db
        .class("User")
        .create(values! { "username" => "virk", "points" => 7 })
        .await
        .unwrap();
    let view: UserView = user.deserialize_into().unwrap();
    assert_eq!(
        view,
        UserView {
            username: "virk".into(),
            handle: "@virk".into(),
            points: Some(7),
        }
    );
}

#[tokio::test]
async fn cherry_picking_reaches_into_relations() {
    let db = TestOrm::blog();
    let mut user = db
        .class("User")
        .create(values! { "username" => "virk", "email" => "virk@example.com" })
        .await
        .unwrap();
    user.create_related("profile", values! { "bio" => "hello" })
        .await
        .unwrap();

    let pick = CherryPick::new()
        .fields(FieldSelector::pick(["username", "profile"]))
        .relation(
            "profile",
            CherryPick::new().fields(FieldSelector::omit(["id", "userId"])),
        );
    let out = user.serialize(Some(&pick)).unwrap();
    assert_eq!(
        out,
        json!({ "username": "virk", "profile": { "bio": "hello" } })
    );
}

#[tokio::test]
async fn relations_load_through_foreign_keys() {
    let db = TestOrm::blog();
    let mut user = db
        .class("User")
        .create(values! { "username" => "virk" })
        .await
        .unwrap();
    let first = user
        .create_related("posts", values! { "title" => "Hello" })
        .await
        .unwrap();
    user.create_related("posts", values! { "title" => "Again" })
        .await
        .unwrap();
    assert_eq!(first.get("userId").unwrap(), Value::Integer(1));

    user.unset_related("posts");
    let posts = user.load("posts").await.unwrap();
    assert_eq!(posts.as_many().map(<[_]>::len), Some(2));

    let mut post = db.class("Post").find_or_fail(2).await.unwrap();
    let author = post.load("author").await.unwrap();
    assert_eq!(
        author.as_one().and_then(|user| user.get_raw("username").cloned()),
        Some(Value::from("virk"))
    );

    assert!(matches!(
        user.load("skills").await,
        Err(CoreError::InvalidOperation { .. })
    ));
}

#[tokio::test]
async fn associate_sets_the_owner_key() {
    let db = TestOrm::blog();
    let user = db
        .class("User")
        .create(values! { "username" => "virk" })
        .await
        .unwrap();
    let mut profile = db.class("Profile").new_instance();
    profile.associate("user", user).await.unwrap();

    assert!(profile.is_persisted());
    assert_eq!(db.rows("profiles")[0]["userId"], Value::Integer(1));
    assert!(matches!(profile.related("user"), Some(Related::One(_))));
}

#[test]
fn relation_shape_errors_name_the_relation() {
    let db = TestOrm::blog();
    let profiles = db.class("Profile");
    let mut user = db.class("User").new_instance();

    let err = user
        .set_related("profile", vec![profiles.new_instance()])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "\"User.profile\" expects a single instance or null, received a list"
    );

    let err = user
        .set_related("profile", db.class("Post").new_instance())
        .unwrap_err();
    assert!(matches!(err, CoreError::RelatedTypeMismatch { .. }));
}
