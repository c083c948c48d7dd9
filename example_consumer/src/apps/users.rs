//! Users app: accounts with a unique email, plus a profile lookup and a hand-written stats route.

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use viewset_sdk::{
    AppError, AppModule, Column, CustomKind, Field, MethodCall, Model, Record, Relation, RequestContext, Schema,
    View, ViewHooks,
};

pub struct Users;

struct UserHooks;

#[async_trait]
impl ViewHooks for UserHooks {
    async fn create_validation(&self, _ctx: &RequestContext, data: &Record) -> Result<(), AppError> {
        if data.get("name").and_then(Value::as_str) == Some("admin") {
            return Err(AppError::Validation("name 'admin' is reserved".into()));
        }
        Ok(())
    }

    async fn on_create(&self, _ctx: RequestContext, instance: Record) -> Result<(), AppError> {
        tracing::info!(id = %instance["id"], "welcome mail queued");
        Ok(())
    }
}

fn user_out() -> Schema {
    Schema::new("UserOut")
        .field(Field::integer("id"))
        .field(Field::string("name"))
        .field(Field::string("email"))
        .field(Field::string("created_at").optional())
}

impl AppModule for Users {
    fn name(&self) -> &str {
        "users"
    }

    fn models(&self) -> Vec<Model> {
        vec![Model::new("user")
            .column(Column::integer("id").primary_key())
            .column(Column::varchar("name", 100).not_null().index())
            .column(Column::varchar("email", 255).not_null().unique())
            .column(Column::timestamp("created_at").default_expr("CURRENT_TIMESTAMP"))
            .relation(Relation::one_to_many("posts", "id", "post", "author_id"))]
    }

    fn views(&self) -> Vec<View> {
        vec![View::new("UserView", "user")
            .schema_in(
                Schema::new("UserIn")
                    .field(Field::string("name").min_length(1).max_length(100))
                    .field(Field::string("email").format("email")),
            )
            .schema_out(user_out())
            .methods(["create", "get", "update", "partial_update", "delete", "list"])
            .custom_method(CustomKind::Get, "profile", |call: MethodCall| async move {
                let pk = call.pk.unwrap_or(Value::Null);
                let user = call
                    .orm
                    .select_related(&["posts"], &[("id".to_string(), pk.clone())])
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("user {}", pk)))?;
                Ok::<_, AppError>(Value::Object(user))
            })
            .hooks(UserHooks)]
    }

    fn router(&self) -> Option<Router> {
        Some(Router::new().route("/stats/users", get(|| async { Json(json!({"app": "users"})) })))
    }
}
