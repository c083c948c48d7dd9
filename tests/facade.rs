//! Record access facade and session manager against SQLite.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;
use viewset_sdk::{AppError, Column, Model, Orm, PoolSettings, Record, Registry, Relation, SessionManager};

fn rec(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        _ => panic!("not an object"),
    }
}

fn filter(k: &str, v: Value) -> Vec<(String, Value)> {
    vec![(k.to_string(), v)]
}

async fn setup() -> (tempfile::TempDir, Orm, Orm) {
    let registry = Arc::new(common::registry());
    let (dir, sessions) = common::database(&registry).await;
    let users = Orm::for_model("user", sessions.clone(), registry.clone()).unwrap();
    let posts = users.related("post").unwrap();
    (dir, users, posts)
}

#[tokio::test]
async fn create_get_and_defaults() {
    let (_dir, users, _) = setup().await;
    let created = users
        .create(rec(json!({"name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    assert_eq!(created["id"], json!(1));
    assert_eq!(created["active"], json!(true));
    let fetched = users.get(&json!(1)).await.unwrap().unwrap();
    assert_eq!(fetched, created);
    assert!(users.get(&json!(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_unique_value_is_rejected() {
    let (_dir, users, _) = setup().await;
    let data = rec(json!({"name": "a", "email": "a@x.com"}));
    users.validate_unique_fields(&data, None).await.unwrap();
    users.create(data.clone()).await.unwrap();
    let err = users.validate_unique_fields(&data, None).await.unwrap_err();
    match err {
        AppError::UniqueViolation { column, value } => {
            assert_eq!(column, "email");
            assert_eq!(value, "a@x.com");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The row itself may keep its own value.
    users
        .validate_unique_fields(&data, Some(&json!(1)))
        .await
        .unwrap();
    let err = users
        .validate_unique_fields(&rec(json!({"id": 5})), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn dangling_foreign_key_is_a_relation_error() {
    let (_dir, users, posts) = setup().await;
    let err = posts
        .validate_relations(&rec(json!({"title": "t", "author_id": 42})), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Relation(ref m) if m.contains("42")), "{err}");

    let err = posts
        .validate_relations(&rec(json!({"title": "t"})), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Relation(_)));
    // Partial payloads only check what they carry.
    posts
        .validate_relations(&rec(json!({"title": "t"})), true)
        .await
        .unwrap();

    users
        .create(rec(json!({"name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    posts
        .validate_relations(&rec(json!({"author_id": 1, "editor_id": null})), false)
        .await
        .unwrap();
    assert_eq!(posts.count().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_reports_whether_a_row_went_away() {
    let (_dir, users, _) = setup().await;
    assert!(!users.delete(&json!(1)).await.unwrap());
    users
        .create(rec(json!({"name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    assert!(users.delete(&json!(1)).await.unwrap());
    assert!(!users.delete(&json!(1)).await.unwrap());
}

#[tokio::test]
async fn update_writes_only_the_given_columns() {
    let (_dir, users, _) = setup().await;
    users
        .create(rec(json!({"name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    let updated = users
        .update(&json!(1), rec(json!({"name": "b"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["name"], json!("b"));
    assert_eq!(updated["email"], json!("a@x.com"));
    assert!(users
        .update(&json!(7), rec(json!({"name": "b"})))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn empty_table_lists_nothing() {
    let (_dir, users, _) = setup().await;
    assert!(users.all().await.unwrap().is_empty());
    assert!(users.filter(&filter("name", json!("a"))).await.unwrap().is_empty());
    assert!(users.first(&[]).await.unwrap().is_none());
    assert_eq!(users.count().await.unwrap(), 0);
}

#[tokio::test]
async fn filters_count_exists_and_pages() {
    let (_dir, users, _) = setup().await;
    for i in 0..5 {
        users
            .create(rec(json!({"name": if i % 2 == 0 { "even" } else { "odd" }, "email": format!("u{i}@x.com")})))
            .await
            .unwrap();
    }
    assert_eq!(users.filter(&filter("name", json!("even"))).await.unwrap().len(), 3);
    assert_eq!(users.count_where(&filter("name", json!("odd"))).await.unwrap(), 2);
    assert!(users.exists(&filter("email", json!("u4@x.com"))).await.unwrap());
    assert!(!users.exists(&filter("email", json!("nobody@x.com"))).await.unwrap());
    let page = users.filter_page(&[], Some(2), Some(1)).await.unwrap();
    let ids: Vec<_> = page.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(2), json!(3)]);
    let tail = users.filter_page(&[], None, Some(4)).await.unwrap();
    assert_eq!(tail.len(), 1);
}

#[tokio::test]
async fn unknown_attributes_are_attribute_errors() {
    let (_dir, users, _) = setup().await;
    let err = users.filter(&filter("password", json!("x"))).await.unwrap_err();
    assert!(matches!(err, AppError::Attribute(_)));
    let err = users.select_related(&["friends"], &[]).await.unwrap_err();
    assert!(matches!(err, AppError::Attribute(ref m) if m.contains("friends")));
    let err = users
        .update(&json!(1), rec(json!({"nickname": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Attribute(_)));
}

#[tokio::test]
async fn select_related_loads_both_directions() {
    let (_dir, users, posts) = setup().await;
    users
        .create(rec(json!({"name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    posts
        .create(rec(json!({"title": "one", "author_id": 1})))
        .await
        .unwrap();
    posts
        .create(rec(json!({"title": "two", "author_id": 1})))
        .await
        .unwrap();

    let user = users
        .select_related(&["posts"], &filter("id", json!(1)))
        .await
        .unwrap()
        .unwrap();
    let titles: Vec<_> = user["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("one"), json!("two")]);

    let post = posts
        .select_related(&["author", "editor"], &filter("title", json!("two")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post["author"]["email"], json!("a@x.com"));
    assert_eq!(post["editor"], Value::Null);

    assert!(users
        .select_related(&["posts"], &filter("id", json!(9)))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn save_inserts_or_merges() {
    let (_dir, users, _) = setup().await;
    let saved = users
        .save(rec(json!({"name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    assert_eq!(saved["id"], json!(1));
    let merged = users
        .save(rec(json!({"id": 1, "name": "renamed", "email": "a@x.com"})))
        .await
        .unwrap();
    assert_eq!(merged["name"], json!("renamed"));
    assert_eq!(users.count().await.unwrap(), 1);
}

#[tokio::test]
async fn failed_statement_rolls_back_its_session() {
    let (_dir, users, _) = setup().await;
    users
        .create(rec(json!({"name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    // The database's own UNIQUE constraint fires when the pre-check is skipped.
    let err = users
        .create(rec(json!({"name": "b", "email": "a@x.com"})))
        .await
        .unwrap_err();
    match err {
        AppError::UniqueViolation { column, value } => {
            assert_eq!(column, "email");
            assert_eq!(value, "a@x.com");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(users.count().await.unwrap(), 1);

    users
        .create(rec(json!({"name": "b", "email": "b@x.com"})))
        .await
        .unwrap();
    let err = users
        .update(&json!(2), rec(json!({"email": "a@x.com"})))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UniqueViolation { ref column, .. } if column == "email"), "{err}");
}

#[tokio::test]
async fn boolean_columns_round_trip() {
    let (_dir, users, _) = setup().await;
    let created = users
        .create(rec(json!({"name": "a", "email": "a@x.com", "active": false})))
        .await
        .unwrap();
    assert_eq!(created["active"], json!(false));
    users
        .create(rec(json!({"name": "b", "email": "b@x.com"})))
        .await
        .unwrap();
    let inactive = users.filter(&filter("active", json!(false))).await.unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0]["email"], json!("a@x.com"));
    let flipped = users
        .update(&json!(1), rec(json!({"active": true})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flipped["active"], json!(true));
    assert_eq!(users.count_where(&filter("active", json!(true))).await.unwrap(), 2);
}

fn tagging_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            Model::new("tags")
                .named("tag")
                .column(Column::uuid("id").primary_key())
                .column(Column::text("label").not_null()),
        )
        .unwrap();
    registry
        .register(
            Model::new("taggings")
                .named("tagging")
                .column(Column::integer("id").primary_key())
                .column(Column::uuid("tag_id").not_null())
                .relation(Relation::many_to_one("tag", "tag_id", "tag", "id")),
        )
        .unwrap();
    registry.validate().unwrap();
    registry
}

#[tokio::test]
async fn uuid_keys_and_renamed_tables() {
    let registry = Arc::new(tagging_registry());
    let (_dir, sessions) = common::database(&registry).await;
    let tags = Orm::for_model("tag", sessions.clone(), registry.clone()).unwrap();
    let taggings = tags.related("tagging").unwrap();

    let tag = tags.create(rec(json!({"label": "rust"}))).await.unwrap();
    let id = tag["id"].clone();
    assert!(uuid::Uuid::parse_str(id.as_str().unwrap()).is_ok(), "{id}");
    assert_eq!(tags.get(&id).await.unwrap().unwrap()["label"], json!("rust"));

    let tagging = taggings.create(rec(json!({"tag_id": id.clone()}))).await.unwrap();
    assert_eq!(tagging["tag_id"], id);
    let loaded = taggings
        .select_related(&["tag"], &filter("id", json!(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded["tag"]["label"], json!("rust"));

    let second = tags.create(rec(json!({"label": "sql"}))).await.unwrap();
    assert_ne!(second["id"], id);
}

#[tokio::test]
async fn uninitialized_manager_fails_fast() {
    let registry = Arc::new(common::registry());
    let sessions = Arc::new(SessionManager::new());
    let users = Orm::for_model("user", sessions.clone(), registry.clone()).unwrap();
    assert!(matches!(users.all().await, Err(AppError::NotInitialized)));
    assert!(matches!(sessions.ping().await, Err(AppError::NotInitialized)));

    let dir = tempfile::tempdir().unwrap();
    let url = common::sqlite_url(&dir);
    sessions.initialize(&url, &PoolSettings::default()).await.unwrap();
    assert!(sessions.initialize(&url, &PoolSettings::default()).await.is_err());
    sessions.create_all(&registry).await.unwrap();
    assert!(users.all().await.unwrap().is_empty());

    sessions.close().await;
    assert!(matches!(users.count().await, Err(AppError::NotInitialized)));
}
