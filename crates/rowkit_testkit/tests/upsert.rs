//! Lookup-then-write operations under concurrency and failure.

use rowkit_core::{model_hook, CoreError, HookEvent};
use rowkit_testkit::prelude::*;
use rowkit_value::Value;

fn counting_user_orm() -> TestOrm {
    let db = TestOrm::new();
    db.define(user_definition().hook(
        HookEvent::BeforeUpdate,
        model_hook(|user| {
            let points = user.get("points")?.as_integer().unwrap_or(0);
            user.set("points", points + 1)
        }),
    ));
    db
}

#[tokio::test]
async fn concurrent_update_or_create_runs_one_after_the_other() {
    init_tracing();
    let db = counting_user_orm();
    let users = db.class("User");
    users
        .create(values! { "username" => "virk", "points" => 0 })
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        users.update_or_create(
            values! { "username" => "virk" },
            values! { "email" => "a@example.com" },
        ),
        users.update_or_create(
            values! { "username" => "virk" },
            values! { "email" => "b@example.com" },
        ),
    );
    a.unwrap();
    b.unwrap();

    let rows = db.rows("users");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["points"], Value::Integer(2));
    assert_eq!(db.adapter.stats().transactions_committed(), 2);
}

#[tokio::test]
async fn update_or_create_creates_on_a_miss() {
    let db = TestOrm::blog();
    let users = db.class("User");
    let user = users
        .update_or_create(
            values! { "username" => "virk" },
            values! { "points" => 3 },
        )
        .await
        .unwrap();
    assert!(user.is_persisted());
    assert_eq!(user.get("username").unwrap(), Value::from("virk"));
    assert_eq!(db.rows("users")[0]["points"], Value::Integer(3));
}

#[tokio::test]
async fn first_or_create_leaves_existing_rows_alone() {
    let db = TestOrm::blog();
    let users = db.class("User");
    users
        .create(values! { "username" => "virk", "points" => 1 })
        .await
        .unwrap();

    let found = users
        .first_or_create(values! { "username" => "virk" }, values! { "points" => 9 })
        .await
        .unwrap();
    assert_eq!(found.get("points").unwrap(), Value::Integer(1));
    assert_eq!(db.adapter.stats().inserts(), 1);
}

#[tokio::test]
async fn failing_batch_row_rolls_back_the_whole_batch() {
    let db = TestOrm::new();
    db.define(user_definition().hook(
        HookEvent::BeforeCreate,
        model_hook(|user| {
            if user.get("username")?.as_text() == Some("mallory") {
                return Err(CoreError::hook_abort("mallory is not welcome"));
            }
            Ok(())
        }),
    ));
    let users = db.class("User");
    users
        .create(values! { "username" => "virk", "points" => 1 })
        .await
        .unwrap();

    let err = users
        .update_or_create_many(
            &["username"],
            vec![
                values! { "username" => "virk", "points" => 50 },
                values! { "username" => "romain", "points" => 5 },
                values! { "username" => "mallory", "points" => 0 },
            ],
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "hook aborted: mallory is not welcome");

    let rows = db.rows("users");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["points"], Value::Integer(1));
    assert_eq!(db.adapter.stats().transactions_rolled_back(), 1);
}

#[tokio::test]
async fn batch_rows_without_key_values_are_rejected_before_any_write() {
    let db = TestOrm::blog();
    let users = db.class("User");
    let err = users
        .fetch_or_create_many(
            &["username", "email"],
            vec![
                values! { "username" => "virk", "email" => "virk@example.com" },
                values! { "username" => "romain", "email" => Value::Null },
            ],
        )
        .await
        .unwrap_err();

    match err {
        CoreError::MissingKeyValue {
            attribute, row, ..
        } => {
            assert_eq!(attribute, "email");
            assert_eq!(row, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(db.adapter.stats().writes(), 0);
    assert_eq!(db.adapter.stats().transactions_started(), 0);
}

#[tokio::test]
async fn batch_results_follow_payload_order() {
    let db = TestOrm::blog();
    let users = db.class("User");
    users
        .create(values! { "username" => "romain", "points" => 1 })
        .await
        .unwrap();

    let out = users
        .update_or_create_many(
            &["username"],
            vec![
                values! { "username" => "virk", "points" => 2 },
                values! { "username" => "romain", "points" => 3 },
                values! { "username" => "virk", "points" => 4 },
            ],
        )
        .await
        .unwrap();

    let ids: Vec<Value> = out
        .iter()
        .map(|user| user.primary_key_value().cloned().unwrap())
        .collect();
    assert_eq!(ids, vec![Value::Integer(2), Value::Integer(1), Value::Integer(2)]);
    assert_eq!(db.rows("users").len(), 2);
    assert_eq!(out[2].get("points").unwrap(), Value::Integer(4));
}
