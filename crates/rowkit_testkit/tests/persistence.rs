//! Save, delete and refresh against the in-memory adapter.

use rowkit_core::CoreError;
use rowkit_testkit::prelude::*;
use rowkit_value::Value;

#[tokio::test]
async fn create_maps_columns_and_assigns_keys() {
    init_tracing();
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

    assert!(user.is_persisted());
    assert!(!user.is_dirty());
    assert_eq!(user.primary_key_value(), Some(&Value::Integer(1)));

    let rows = db.rows("users");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email_address"], Value::from("virk@example.com"));
    assert!(!rows[0].contains_key("email"));
    assert!(rows[0]["createdAt"].as_datetime().is_some());
    assert!(rows[0]["updatedAt"].as_datetime().is_some());
}

#[tokio::test]
async fn saving_twice_writes_once() {
    let db = TestOrm::blog();
    let mut user = db
        .class("User")
        .create(values! { "username" => "virk" })
        .await
        .unwrap();
    assert_eq!(db.adapter.stats().writes(), 1);

    user.save().await.unwrap();
    assert_eq!(db.adapter.stats().writes(), 1);

    user.set("points", 10).unwrap();
    user.save().await.unwrap();
    user.save().await.unwrap();
    assert_eq!(db.adapter.stats().updates(), 1);
    assert_eq!(db.rows("users")[0]["points"], Value::Integer(10));
}

#[tokio::test]
async fn updates_keep_created_at_and_touch_updated_at() {
    let db = TestOrm::blog();
    let mut user = db
        .class("User")
        .create(values! { "username" => "virk" })
        .await
        .unwrap();
    let created = user.get("createdAt").unwrap();
    let updated = user.get("updatedAt").unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    user.set("points", 1).unwrap();
    user.save().await.unwrap();

    assert_eq!(user.get("createdAt").unwrap(), created);
    assert_ne!(user.get("updatedAt").unwrap(), updated);
}

#[tokio::test]
async fn explicit_timestamps_win_on_insert() {
    let db = TestOrm::blog();
    let created = Value::from(chrono::Utc::now() - chrono::Duration::days(3));
    let user = db
        .class("User")
        .create(values! { "username" => "virk", "createdAt" => created.clone() })
        .await
        .unwrap();
    assert_eq!(user.get("createdAt").unwrap(), created);
}

#[tokio::test]
async fn delete_freezes_the_instance() {
    let db = TestOrm::blog();
    let users = db.class("User");
    let mut user = users
        .create(values! { "username" => "virk" })
        .await
        .unwrap();

    user.delete().await.unwrap();
    assert!(user.is_deleted());
    assert!(db.rows("users").is_empty());
    assert!(matches!(
        user.set("username", "nikk"),
        Err(CoreError::DeletedInstance { .. })
    ));
    assert!(matches!(
        user.save().await,
        Err(CoreError::DeletedInstance { .. })
    ));

    let mut fresh = users.new_instance();
    assert!(fresh.delete().await.is_err());
}

#[tokio::test]
async fn refresh_reads_through_the_bound_transaction() {
    let db = TestOrm::blog();
    let users = db.class("User");
    let mut user = users
        .create(values! { "username" => "virk", "points" => 1 })
        .await
        .unwrap();

    let trx = db.transaction().await.unwrap();
    let mut inside = users
        .clone()
        .use_transaction(trx.clone())
        .find_or_fail(1)
        .await
        .unwrap();
    inside.set("points", 5).unwrap();
    inside.save().await.unwrap();

    user.use_transaction(trx.clone());
    user.refresh().await.unwrap();
    assert_eq!(user.get("points").unwrap(), Value::Integer(5));
    assert!(!user.is_dirty());

    trx.rollback().await.unwrap();
    user.refresh().await.unwrap();
    assert_eq!(user.get("points").unwrap(), Value::Integer(1));
}

#[tokio::test]
async fn refresh_fails_once_the_row_is_gone() {
    let db = TestOrm::blog();
    let users = db.class("User");
    let mut user = users
        .create(values! { "username" => "virk" })
        .await
        .unwrap();
    let mut other = users.find_or_fail(1).await.unwrap();
    other.delete().await.unwrap();

    let err = user.refresh().await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn fill_rejects_unknown_keys_and_merge_can_keep_them() {
    let db = TestOrm::blog();
    let mut user = db.class("User").new_instance();

    let err = user
        .fill(values! { "username" => "virk", "isAdmin" => true }, false)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot define \"isAdmin\" on \"User\" model, since it is not defined as a model property"
    );
    assert!(user.attributes().is_empty());

    user.merge(values! { "username" => "virk", "isAdmin" => true }, true)
        .unwrap();
    assert_eq!(user.get("username").unwrap(), Value::from("virk"));
    assert_eq!(user.extras()["isAdmin"], Value::Bool(true));
}

#[tokio::test]
async fn column_names_are_accepted_as_input() {
    let db = TestOrm::blog();
    let mut user = db.class("User").new_instance();
    user.merge(values! { "email_address" => "virk@example.com" }, false)
        .unwrap();
    assert_eq!(user.get("email").unwrap(), Value::from("virk@example.com"));
}
