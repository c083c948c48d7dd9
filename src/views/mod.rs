//! Views: declarative CRUD endpoints over a model.
//!
//! A [`View`] names a model, its schemas and the operations to expose. Registration
//! compiles it into a route table ([`route_table`]); a [`ViewRuntime`] binds it to the
//! model's [`Orm`](crate::service::Orm) and runs each request through guards, validation,
//! hooks and persistence.

mod hooks;
mod operations;
mod registration;
mod view;

pub use hooks::{Guard, NoHooks, RequireBearer, ViewHooks};
pub use operations::ViewRuntime;
pub use registration::{operation_id, route_table, Operation, RouteSpec, RouteTarget, Verb};
pub use view::{CustomHandler, CustomKind, MethodCall, View};
