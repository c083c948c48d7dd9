//! Generated routes end to end: assembled router, SQLite database, oneshot requests.

mod common;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;
use viewset_sdk::{
    AppError, AppModule, Application, CustomKind, Field, MethodCall, Model, Record, RegistrationError,
    RequestContext, RequireBearer, Schema, SessionManager, View, ViewHooks,
};

struct Recorder(mpsc::UnboundedSender<String>);

#[async_trait]
impl ViewHooks for Recorder {
    async fn on_create(&self, _ctx: RequestContext, instance: Record) -> Result<(), AppError> {
        let _ = self.0.send(format!("created {}", instance["email"].as_str().unwrap_or_default()));
        Ok(())
    }

    async fn pre_delete(&self, ctx: &RequestContext, _pk: &Value) -> Result<(), AppError> {
        if ctx.header("x-protected").is_some() {
            return Err(AppError::Forbidden("protected".into()));
        }
        Ok(())
    }

    async fn on_delete(&self, _ctx: RequestContext, pk: Value, deleted: bool) -> Result<(), AppError> {
        let _ = self.0.send(format!("deleted {} {}", pk, deleted));
        // Failures here are logged, never returned to the client.
        Err(AppError::BadRequest("post-hook failure".into()))
    }
}

fn user_out() -> Schema {
    Schema::new("UserOut")
        .field(Field::integer("id"))
        .field(Field::string("name"))
        .field(Field::string("email"))
        .field(Field::boolean("active").optional())
        .field(Field::string("bio").optional())
}

struct Users {
    events: mpsc::UnboundedSender<String>,
}

impl AppModule for Users {
    fn name(&self) -> &str {
        "users"
    }

    fn models(&self) -> Vec<Model> {
        vec![common::user_model()]
    }

    fn views(&self) -> Vec<View> {
        vec![View::new("UserView", "user")
            .schema_in(
                Schema::new("UserIn")
                    .field(Field::string("name").min_length(1))
                    .field(Field::string("email").format("email"))
                    .field(Field::string("bio").optional()),
            )
            .schema_out(user_out())
            .methods(["create", "get", "update", "partial_update", "delete", "list"])
            .list_methods(["active"])
            .handler("active", |call: MethodCall| async move {
                let rows = call.orm.filter(&[("active".to_string(), json!(true))]).await?;
                Ok::<_, AppError>(Value::Array(rows.into_iter().map(Value::Object).collect()))
            })
            .schema_out_for("active", user_out())
            .custom_method(CustomKind::Get, "profile", |call: MethodCall| async move {
                let pk = call.pk.unwrap_or(Value::Null);
                let user = call
                    .orm
                    .select_related(&["posts"], &[("id".to_string(), pk.clone())])
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("user {}", pk)))?;
                Ok::<_, AppError>(json!({"name": user["name"], "posts": user["posts"].as_array().map(Vec::len)}))
            })
            .schema_in_for("register", Schema::new("Register").field(Field::string("email").format("email")))
            .custom_method(CustomKind::Post, "register", |call: MethodCall| async move {
                let mut data = call.data.unwrap_or_default();
                data.insert("name".into(), json!("registered"));
                let created = call.orm.create(data).await?;
                Ok::<_, AppError>(Value::Object(created))
            })
            .guard_for("register", RequireBearer)
            .hooks(Recorder(self.events.clone()))]
    }
}

struct Posts;

impl AppModule for Posts {
    fn name(&self) -> &str {
        "posts"
    }

    fn models(&self) -> Vec<Model> {
        vec![common::post_model()]
    }

    fn views(&self) -> Vec<View> {
        vec![View::new("PostView", "post")
            .schema_in(
                Schema::new("PostIn")
                    .field(Field::string("title"))
                    .field(Field::integer("author_id"))
                    .field(Field::integer("editor_id").optional()),
            )
            .schema_out(
                Schema::new("PostOut")
                    .field(Field::integer("id"))
                    .field(Field::string("title"))
                    .field(Field::integer("author_id")),
            )
            .methods(["create", "get", "list"])
            .guard(RequireBearer)]
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    router: Router,
    events: mpsc::UnboundedReceiver<String>,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(
        SessionManager::connect(&common::sqlite_url(&dir), &Default::default())
            .await
            .unwrap(),
    );
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Application::builder(sessions)
        .module(Users { events: tx })
        .module(Posts)
        .build()
        .unwrap();
    app.create_tables().await.unwrap();
    Harness {
        _dir: dir,
        router: app.into_router(),
        events: rx,
    }
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_user(router: &Router, name: &str, email: &str) -> Value {
    let (status, body) = call(router, "POST", "/users", Some(json!({"name": name, "email": email})), None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("post-hook did not run")
        .expect("channel closed")
}

#[tokio::test]
async fn create_then_read_back() {
    let mut h = harness().await;
    let user = create_user(&h.router, "a", "a@x.com").await;
    assert_eq!(user, json!({"id": 1, "name": "a", "email": "a@x.com", "active": true, "bio": null}));
    assert_eq!(next_event(&mut h.events).await, "created a@x.com");

    let (status, body) = call(&h.router, "GET", "/users/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], json!("a@x.com"));

    let (status, body) = call(&h.router, "GET", "/users/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], json!(1));

    let (status, _) = call(&h.router, "GET", "/users/2", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = call(&h.router, "GET", "/users/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));
}

#[tokio::test]
async fn listing_an_empty_table_gives_an_empty_array() {
    let h = harness().await;
    let (status, body) = call(&h.router, "GET", "/users", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": [], "meta": {"count": 0}}));
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let h = harness().await;
    create_user(&h.router, "a", "a@x.com").await;
    create_user(&h.router, "b", "b@x.com").await;
    create_user(&h.router, "a", "c@x.com").await;
    let (_, body) = call(&h.router, "GET", "/users?name=a", None, None).await;
    assert_eq!(body["meta"]["count"], json!(2));
    let (_, body) = call(&h.router, "GET", "/users?limit=1&offset=1", None, None).await;
    assert_eq!(body["data"][0]["email"], json!("b@x.com"));
    let (status, _) = call(&h.router, "GET", "/users?limit=-5", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let h = harness().await;
    let (status, body) = call(&h.router, "POST", "/users", Some(json!({"name": "a"})), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], json!("validation_error"));
    let (status, _) = call(&h.router, "POST", "/users", Some(json!({"name": "a", "email": "nope"})), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = call(&h.router, "POST", "/users", Some(json!({"name": 1, "email": "a@x.com"})), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn duplicate_unique_value_conflicts() {
    let h = harness().await;
    create_user(&h.router, "a", "a@x.com").await;
    let (status, body) = call(&h.router, "POST", "/users", Some(json!({"name": "b", "email": "a@x.com"})), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("unique_violation"));
    assert_eq!(body["error"]["details"]["column"], json!("email"));
}

#[tokio::test]
async fn dangling_foreign_key_fails_before_any_write() {
    let h = harness().await;
    let (status, body) = call(
        &h.router,
        "POST",
        "/posts",
        Some(json!({"title": "t", "author_id": 42})),
        Some("token"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], json!("relation_error"));
    let (_, body) = call(&h.router, "GET", "/posts", None, Some("token")).await;
    assert_eq!(body["meta"]["count"], json!(0));

    create_user(&h.router, "a", "a@x.com").await;
    let (status, body) = call(
        &h.router,
        "POST",
        "/posts/",
        Some(json!({"title": "t", "author_id": 1})),
        Some("token"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"], json!({"id": 1, "title": "t", "author_id": 1}));
}

#[tokio::test]
async fn partial_update_keeps_unsent_fields() {
    let h = harness().await;
    create_user(&h.router, "a", "a@x.com").await;
    let (status, body) = call(&h.router, "PATCH", "/users/1", Some(json!({"name": "b"})), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"id": 1, "name": "b", "email": "a@x.com", "active": true, "bio": null}));

    let (status, _) = call(&h.router, "PATCH", "/users/9", Some(json!({"name": "b"})), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_update_needs_every_field() {
    let h = harness().await;
    create_user(&h.router, "a", "a@x.com").await;
    create_user(&h.router, "b", "b@x.com").await;
    let (status, _) = call(&h.router, "PUT", "/users/1", Some(json!({"name": "z"})), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    // Keeping its own email is fine, taking another row's is not.
    let (status, body) = call(&h.router, "PUT", "/users/1", Some(json!({"name": "z", "email": "a@x.com"})), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("z"));
    let (status, _) = call(&h.router, "PUT", "/users/1", Some(json!({"name": "z", "email": "b@x.com"})), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn full_update_clears_omitted_optional_fields() {
    let h = harness().await;
    let body = json!({"name": "a", "email": "a@x.com", "bio": "hi"});
    let (status, _) = call(&h.router, "POST", "/users", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&h.router, "PATCH", "/users/1", Some(json!({"name": "b"})), None).await;
    assert_eq!(body["data"]["bio"], json!("hi"));

    let (status, body) = call(&h.router, "PUT", "/users/1", Some(json!({"name": "c", "email": "a@x.com"})), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"id": 1, "name": "c", "email": "a@x.com", "active": true, "bio": null}));
}

#[tokio::test]
async fn boolean_columns_filter_and_round_trip() {
    let h = harness().await;
    create_user(&h.router, "a", "a@x.com").await;
    let (_, body) = call(&h.router, "GET", "/users?active=true", None, None).await;
    assert_eq!(body["meta"]["count"], json!(1));
    assert_eq!(body["data"][0]["active"], json!(true));
    let (_, body) = call(&h.router, "GET", "/users?active=false", None, None).await;
    assert_eq!(body["meta"]["count"], json!(0));
}

#[tokio::test]
async fn delete_of_a_missing_key_is_not_an_error() {
    let mut h = harness().await;
    let (status, body) = call(&h.router, "DELETE", "/users/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"deleted": false}));
    assert_eq!(next_event(&mut h.events).await, "deleted 1 false");

    create_user(&h.router, "a", "a@x.com").await;
    assert_eq!(next_event(&mut h.events).await, "created a@x.com");
    let (_, body) = call(&h.router, "DELETE", "/users/1", None, None).await;
    assert_eq!(body["data"], json!({"deleted": true}));
}

#[tokio::test]
async fn pre_hook_errors_abort_the_operation() {
    let h = harness().await;
    create_user(&h.router, "a", "a@x.com").await;
    let request = Request::builder()
        .method("DELETE")
        .uri("/users/1")
        .header("x-protected", "1")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let (status, _) = call(&h.router, "GET", "/users/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn guards_run_before_the_operation() {
    let h = harness().await;
    let (status, body) = call(&h.router, "GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("unauthorized"));
    let (status, _) = call(&h.router, "GET", "/posts", None, Some("t")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn custom_methods_are_routed_by_kind() {
    let h = harness().await;
    create_user(&h.router, "a", "a@x.com").await;

    let (status, body) = call(&h.router, "GET", "/users/active", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["email"], json!("a@x.com"));

    let (status, body) = call(&h.router, "GET", "/users/profile/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"name": "a", "posts": 0}));

    let (status, _) = call(&h.router, "POST", "/users/register", Some(json!({"email": "r@x.com"})), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = call(
        &h.router,
        "POST",
        "/users/register",
        Some(json!({"email": "r@x.com"})),
        Some("t"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], json!("registered"));
    let (status, _) = call(&h.router, "POST", "/users/register", Some(json!({"email": 3})), Some("t")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn common_routes_are_mounted() {
    let h = harness().await;
    let (status, body) = call(&h.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    let (status, body) = call(&h.router, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], json!("ok"));
}

struct Purge;

impl AppModule for Purge {
    fn name(&self) -> &str {
        "purge"
    }

    fn models(&self) -> Vec<Model> {
        vec![common::user_model(), common::post_model()]
    }

    fn views(&self) -> Vec<View> {
        vec![View::new("PurgeView", "user").methods(["delete", "purge"])]
    }
}

#[tokio::test]
async fn methods_outside_the_whitelist_fail_registration() {
    let err = Application::builder(Arc::new(SessionManager::new()))
        .module(Purge)
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        AppError::Registration(RegistrationError::InvalidMethod { ref method, .. }) if method == "purge"
    ));
}

struct Clash;

impl AppModule for Clash {
    fn name(&self) -> &str {
        "users"
    }

    fn views(&self) -> Vec<View> {
        vec![View::new("Other", "user").methods(["delete"])]
    }
}

#[tokio::test]
async fn same_route_from_two_views_is_a_duplicate() {
    struct Shadow;
    impl AppModule for Shadow {
        fn name(&self) -> &str {
            "shadow"
        }

        fn views(&self) -> Vec<View> {
            vec![View::new("Shadow", "user").prefix("/users").methods(["delete"])]
        }
    }
    let (tx, _rx) = mpsc::unbounded_channel();
    let err = Application::builder(Arc::new(SessionManager::new()))
        .module(Users { events: tx.clone() })
        .module(Posts)
        .module(Shadow)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, AppError::Registration(RegistrationError::DuplicateRoute { verb: "DELETE", .. })));

    // A module re-added under an existing name is skipped rather than mounted twice.
    let app = Application::builder(Arc::new(SessionManager::new()))
        .module(Users { events: tx })
        .module(Posts)
        .module(Clash)
        .build()
        .unwrap();
    assert!(app.routes().iter().any(|r| r.view == "UserView"));
    assert!(app.routes().iter().all(|r| r.view != "Other"));
}
