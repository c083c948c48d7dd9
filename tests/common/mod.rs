//! Shared fixtures: an on-disk SQLite database and a small blog schema.

#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use viewset_sdk::{Column, Model, PoolSettings, Registry, Relation, SessionManager};

pub fn user_model() -> Model {
    Model::new("user")
        .column(Column::integer("id").primary_key())
        .column(Column::text("name").not_null())
        .column(Column::varchar("email", 255).unique().not_null())
        .column(Column::boolean("active").default_expr("1"))
        .column(Column::text("bio"))
        .relation(Relation::one_to_many("posts", "id", "post", "author_id"))
}

pub fn post_model() -> Model {
    Model::new("post")
        .column(Column::integer("id").primary_key())
        .column(Column::text("title").not_null())
        .column(Column::integer("author_id").not_null().index())
        .column(Column::integer("editor_id"))
        .relation(Relation::many_to_one("author", "author_id", "user", "id"))
        .relation(Relation::many_to_one("editor", "editor_id", "user", "id"))
}

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(user_model()).unwrap();
    registry.register(post_model()).unwrap();
    registry.validate().unwrap();
    registry
}

pub fn sqlite_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display())
}

/// Connected manager over a fresh database, with `registry`'s tables created.
pub async fn database(registry: &Registry) -> (TempDir, Arc<SessionManager>) {
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionManager::connect(&sqlite_url(&dir), &PoolSettings::default())
        .await
        .unwrap();
    sessions.create_all(registry).await.unwrap();
    (dir, Arc::new(sessions))
}
