//! View declarations: which operations a model exposes, with which schemas, guards and hooks.

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::schema::Schema;
use crate::service::Orm;
use crate::views::hooks::{Guard, NoHooks, ViewHooks};
use crate::Record;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Verb family of a custom method; decides its path, whether it takes a pk, and how its body is validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CustomKind {
    /// POST /{name}, full body validation.
    Post,
    /// GET /{name}/{pk}
    Get,
    /// GET /{name}
    List,
    /// PUT /{name}/{pk}, full body validation.
    Put,
    /// PATCH /{name}/{pk}, partial body validation.
    Patch,
    /// DELETE /{name}/{pk}
    Delete,
}

impl CustomKind {
    pub fn takes_pk(self) -> bool {
        !matches!(self, CustomKind::Post | CustomKind::List)
    }

    pub fn takes_body(self) -> bool {
        matches!(self, CustomKind::Post | CustomKind::Put | CustomKind::Patch)
    }
}

/// Everything a custom method receives.
pub struct MethodCall {
    pub ctx: RequestContext,
    pub orm: Orm,
    /// Parsed path key for pk-taking kinds.
    pub pk: Option<Value>,
    /// Validated body for body-taking kinds.
    pub data: Option<Record>,
    pub query: HashMap<String, String>,
}

pub type CustomHandler = Arc<dyn Fn(MethodCall) -> BoxFuture<'static, Result<Value, AppError>> + Send + Sync>;

#[derive(Clone)]
pub struct View {
    pub(crate) name: String,
    pub(crate) model: String,
    pub(crate) schema_in: Option<Arc<Schema>>,
    pub(crate) schema_out: Option<Arc<Schema>>,
    pub(crate) schemas_in: HashMap<String, Arc<Schema>>,
    pub(crate) schemas_out: HashMap<String, Arc<Schema>>,
    pub(crate) methods: Vec<String>,
    pub(crate) custom: Vec<(CustomKind, String)>,
    pub(crate) handlers: HashMap<String, CustomHandler>,
    pub(crate) guards: Vec<Arc<dyn Guard>>,
    pub(crate) guards_by_method: HashMap<String, Vec<Arc<dyn Guard>>>,
    pub(crate) prefix: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) include_router: bool,
    pub(crate) hooks: Arc<dyn ViewHooks>,
}

impl View {
    /// A view named `name` over the registered model `model`. Exposes nothing until `methods` is set.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        View {
            name: name.into(),
            model: model.into(),
            schema_in: None,
            schema_out: None,
            schemas_in: HashMap::new(),
            schemas_out: HashMap::new(),
            methods: Vec::new(),
            custom: Vec::new(),
            handlers: HashMap::new(),
            guards: Vec::new(),
            guards_by_method: HashMap::new(),
            prefix: None,
            tags: Vec::new(),
            include_router: true,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn schema_in(mut self, schema: Schema) -> Self {
        self.schema_in = Some(Arc::new(schema));
        self
    }

    pub fn schema_out(mut self, schema: Schema) -> Self {
        self.schema_out = Some(Arc::new(schema));
        self
    }

    /// Input schema for one method, overriding `schema_in`.
    pub fn schema_in_for(mut self, method: impl Into<String>, schema: Schema) -> Self {
        self.schemas_in.insert(method.into(), Arc::new(schema));
        self
    }

    /// Output schema for one method, overriding `schema_out`.
    pub fn schema_out_for(mut self, method: impl Into<String>, schema: Schema) -> Self {
        self.schemas_out.insert(method.into(), Arc::new(schema));
        self
    }

    /// Builtin operations to expose: any of `create, get, update, partial_update, delete, list`.
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    fn declare<I, S>(mut self, kind: CustomKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom.extend(names.into_iter().map(|n| (kind, n.into())));
        self
    }

    pub fn post_methods<I: IntoIterator<Item = S>, S: Into<String>>(self, names: I) -> Self {
        self.declare(CustomKind::Post, names)
    }

    pub fn get_methods<I: IntoIterator<Item = S>, S: Into<String>>(self, names: I) -> Self {
        self.declare(CustomKind::Get, names)
    }

    pub fn list_methods<I: IntoIterator<Item = S>, S: Into<String>>(self, names: I) -> Self {
        self.declare(CustomKind::List, names)
    }

    pub fn put_methods<I: IntoIterator<Item = S>, S: Into<String>>(self, names: I) -> Self {
        self.declare(CustomKind::Put, names)
    }

    pub fn patch_methods<I: IntoIterator<Item = S>, S: Into<String>>(self, names: I) -> Self {
        self.declare(CustomKind::Patch, names)
    }

    pub fn delete_methods<I: IntoIterator<Item = S>, S: Into<String>>(self, names: I) -> Self {
        self.declare(CustomKind::Delete, names)
    }

    /// Implementation of a declared custom method.
    pub fn handler<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AppError>> + Send + 'static,
    {
        let handler: CustomHandler = Arc::new(move |call| f(call).boxed());
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Declare and implement a custom method in one step.
    pub fn custom_method<F, Fut>(self, kind: CustomKind, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AppError>> + Send + 'static,
    {
        let name = name.into();
        self.declare(kind, [name.clone()]).handler(name, f)
    }

    /// Guard applied to every method without a per-method guard list.
    pub fn guard(mut self, guard: impl Guard) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    /// Guard for one method; once set, the view-wide guards no longer apply to that method.
    pub fn guard_for(mut self, method: impl Into<String>, guard: impl Guard) -> Self {
        self.guards_by_method
            .entry(method.into())
            .or_default()
            .push(Arc::new(guard));
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn tags<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the application assembler mounts this view. Defaults to true.
    pub fn include_router(mut self, include: bool) -> Self {
        self.include_router = include;
        self
    }

    pub fn hooks(mut self, hooks: impl ViewHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub(crate) fn input_schema(&self, method: &str) -> Option<&Arc<Schema>> {
        self.schemas_in.get(method).or(self.schema_in.as_ref())
    }

    pub(crate) fn output_schema(&self, method: &str) -> Option<&Arc<Schema>> {
        self.schemas_out.get(method).or(self.schema_out.as_ref())
    }

    pub(crate) fn guards_for(&self, method: &str) -> &[Arc<dyn Guard>] {
        self.guards_by_method
            .get(method)
            .map(Vec::as_slice)
            .unwrap_or(&self.guards)
    }
}
