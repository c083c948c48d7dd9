//! Mounts a compiled route table onto an axum router.

use crate::extractors::RequestContext;
use crate::handlers::view as h;
use crate::views::{Operation, RouteSpec, RouteTarget, ViewRuntime};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{on, MethodRouter},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;

type ViewMethodRouter = MethodRouter<Arc<ViewRuntime>>;

/// Full paths a relative route answers on. A `/` route under a prefix is reachable with and without the trailing slash.
pub fn full_paths(prefix: &str, path: &str) -> Vec<String> {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), path) {
        (true, _) => vec![path.to_string()],
        (false, "/") => vec![prefix.to_string(), format!("{}/", prefix)],
        (false, _) => vec![format!("{}{}", prefix, path)],
    }
}

fn method_router(spec: &RouteSpec) -> ViewMethodRouter {
    let filter = spec.verb.method_filter();
    match spec.target {
        RouteTarget::Builtin(op) => match op {
            Operation::Create => on(filter, h::create),
            Operation::Get => on(filter, h::read),
            Operation::Update => on(filter, h::update),
            Operation::PartialUpdate => on(filter, h::partial_update),
            Operation::Delete => on(filter, h::delete),
            Operation::List => on(filter, h::list),
        },
        RouteTarget::Custom(kind) if kind.takes_pk() => {
            let name = spec.method.clone();
            on(
                filter,
                move |State(rt): State<Arc<ViewRuntime>>,
                      ctx: RequestContext,
                      Path(pk): Path<String>,
                      Query(query): Query<HashMap<String, String>>,
                      body: Bytes| {
                    let name = name.clone();
                    async move { h::custom(rt, kind, &name, ctx, Some(pk), query, body).await }
                },
            )
        }
        RouteTarget::Custom(kind) => {
            let name = spec.method.clone();
            on(
                filter,
                move |State(rt): State<Arc<ViewRuntime>>,
                      ctx: RequestContext,
                      Query(query): Query<HashMap<String, String>>,
                      body: Bytes| {
                    let name = name.clone();
                    async move { h::custom(rt, kind, &name, ctx, None, query, body).await }
                },
            )
        }
    }
}

/// Router for one bound view. Routes sharing a path are merged into one method router.
pub fn view_routes(rt: Arc<ViewRuntime>, prefix: &str, specs: &[RouteSpec]) -> Router {
    let mut grouped: Vec<(String, Vec<&RouteSpec>)> = Vec::new();
    for spec in specs {
        for path in full_paths(prefix, &spec.path) {
            tracing::debug!(verb = spec.verb.as_str(), path = %path, operation_id = %spec.operation_id, "route");
            match grouped.iter_mut().find(|(p, _)| *p == path) {
                Some((_, group)) => group.push(spec),
                None => grouped.push((path, vec![spec])),
            }
        }
    }
    let mut router = Router::new();
    for (path, group) in grouped {
        let mr = group
            .into_iter()
            .map(method_router)
            .reduce(MethodRouter::merge);
        if let Some(mr) = mr {
            router = router.route(&path, mr);
        }
    }
    router.with_state(rt)
}
