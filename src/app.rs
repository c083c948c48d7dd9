//! Application assembler: merges the models, views and hand-written routers of app modules into one router.

use crate::error::{AppError, ConfigError, RegistrationError};
use crate::model::{Model, Registry};
use crate::routes::{common_routes, full_paths, view_routes};
use crate::service::Orm;
use crate::session::SessionManager;
use crate::settings::DEFAULT_BODY_LIMIT;
use crate::state::AppState;
use crate::views::{route_table, Verb, View, ViewRuntime};
use axum::Router;
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// One feature area of an application: its models, its views and any hand-written routes.
pub trait AppModule: Send + Sync {
    /// Mount point of the module's views (`/{name}`) and their default tag.
    fn name(&self) -> &str;

    fn models(&self) -> Vec<Model> {
        Vec::new()
    }

    fn views(&self) -> Vec<View> {
        Vec::new()
    }

    /// Extra routes merged into the application as they are.
    fn router(&self) -> Option<Router> {
        None
    }
}

/// A route as mounted in the final application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountedRoute {
    pub verb: Verb,
    pub path: String,
    pub operation_id: String,
    pub view: String,
    pub tags: Vec<String>,
}

pub struct ApplicationBuilder {
    sessions: Arc<SessionManager>,
    modules: Vec<Box<dyn AppModule>>,
    body_limit: usize,
}

impl ApplicationBuilder {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        ApplicationBuilder {
            sessions,
            modules: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Add a module. A second module with an already added name is skipped.
    pub fn module(mut self, module: impl AppModule + 'static) -> Self {
        if self.modules.iter().any(|m| m.name() == module.name()) {
            tracing::warn!(module = module.name(), "module already added, skipping");
            return self;
        }
        self.modules.push(Box::new(module));
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Register every model, compile every included view and assemble the router.
    pub fn build(self) -> Result<Application, AppError> {
        let mut registry = Registry::new();
        for module in &self.modules {
            for model in module.models() {
                registry.register(model)?;
            }
        }
        registry.validate()?;
        let registry = Arc::new(registry);

        let mut router = common_routes(AppState {
            sessions: self.sessions.clone(),
        });
        let mut operation_ids = HashSet::new();
        let mut taken: HashSet<(Verb, String)> = ["/health", "/ready", "/version"]
            .into_iter()
            .map(|p| (Verb::Get, p.to_string()))
            .collect();
        let mut routes = Vec::new();

        for module in &self.modules {
            let default_prefix = format!("/{}", module.name().trim_matches('/'));
            for view in module.views() {
                if !view.include_router {
                    tracing::debug!(view = %view.name, "view not included, skipping");
                    continue;
                }
                let model = registry.get(&view.model).ok_or_else(|| RegistrationError::UnknownModel {
                    view: view.name.clone(),
                    model: view.model.clone(),
                })?;
                let specs = route_table(&view)?;
                let prefix = view.prefix.clone().unwrap_or_else(|| default_prefix.clone());
                let tags = if view.tags.is_empty() {
                    vec![module.name().to_string()]
                } else {
                    view.tags.clone()
                };
                for spec in &specs {
                    if !operation_ids.insert(spec.operation_id.clone()) {
                        return Err(RegistrationError::DuplicateOperation(spec.operation_id.clone()).into());
                    }
                    for path in full_paths(&prefix, &spec.path) {
                        if !taken.insert((spec.verb, path.clone())) {
                            return Err(RegistrationError::DuplicateRoute {
                                verb: spec.verb.as_str(),
                                path,
                            }
                            .into());
                        }
                        routes.push(MountedRoute {
                            verb: spec.verb,
                            path,
                            operation_id: spec.operation_id.clone(),
                            view: view.name.clone(),
                            tags: tags.clone(),
                        });
                    }
                }
                tracing::info!(view = %view.name, prefix = %prefix, routes = specs.len(), "view mounted");
                let orm = Orm::new(model, self.sessions.clone(), registry.clone());
                let rt = Arc::new(ViewRuntime::new(view, orm));
                router = router.merge(view_routes(rt, &prefix, &specs));
            }
            if let Some(extra) = module.router() {
                router = router.merge(extra);
            }
        }

        let router = router
            .layer(RequestBodyLimitLayer::new(self.body_limit))
            .layer(TraceLayer::new_for_http());
        Ok(Application {
            router,
            registry,
            sessions: self.sessions,
            routes,
        })
    }
}

/// The assembled application. Immutable once built.
pub struct Application {
    router: Router,
    registry: Arc<Registry>,
    sessions: Arc<SessionManager>,
    routes: Vec<MountedRoute>,
}

impl Application {
    pub fn builder(sessions: Arc<SessionManager>) -> ApplicationBuilder {
        ApplicationBuilder::new(sessions)
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Every generated route, in mount order.
    pub fn routes(&self) -> &[MountedRoute] {
        &self.routes
    }

    /// Facade for one of the application's models.
    pub fn orm(&self, model: &str) -> Result<Orm, AppError> {
        Orm::for_model(model, self.sessions.clone(), self.registry.clone())
    }

    /// Create every model's table (and indexes) that does not exist yet.
    pub async fn create_tables(&self) -> Result<(), AppError> {
        self.sessions.create_all(&self.registry).await
    }
}

impl View {
    /// Router for this view alone, mounted at its own prefix (or the root when it has none).
    /// Useful for hand-assembled applications; `registry` must contain the view's model.
    pub fn as_router(self, sessions: Arc<SessionManager>, registry: Arc<Registry>) -> Result<Router, AppError> {
        let specs = route_table(&self)?;
        let model = registry.get(&self.model).ok_or_else(|| {
            AppError::Config(ConfigError::MissingReference {
                kind: "model",
                id: self.model.clone(),
            })
        })?;
        let prefix = self.prefix.clone().unwrap_or_default();
        let rt = Arc::new(ViewRuntime::new(self, Orm::new(model, sessions, registry)));
        Ok(view_routes(rt, &prefix, &specs))
    }
}
