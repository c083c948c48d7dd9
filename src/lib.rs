//! Viewset SDK: declarative CRUD views, record access and session management over axum and sqlx.

pub mod app;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod logging;
pub mod migration;
pub mod model;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod session;
pub mod settings;
pub mod sql;
pub mod state;
pub mod views;

/// A stored row, or a validated request body, keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

pub use app::{AppModule, Application, ApplicationBuilder, MountedRoute};
pub use error::{AppError, ConfigError, RegistrationError};
pub use extractors::RequestContext;
pub use logging::init_tracing;
pub use model::{Column, ColumnType, Model, Registry, Relation, RelationKind};
pub use response::{success_many, success_one, success_one_ok};
pub use schema::{Field, FieldType, Schema, ValidationRule};
pub use service::Orm;
pub use session::{Dialect, PoolSettings, Session, SessionManager};
pub use settings::Settings;
pub use state::AppState;
pub use views::{CustomKind, Guard, MethodCall, NoHooks, RequireBearer, View, ViewHooks};
