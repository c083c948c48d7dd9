//! HTTP handlers for the generated view routes. Each unwraps the request and delegates to the bound [`ViewRuntime`].

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::response::{success_many, success_one, success_one_ok, Deleted};
use crate::views::{CustomKind, ViewRuntime};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type ViewState = State<Arc<ViewRuntime>>;

pub async fn create(
    State(rt): ViewState,
    ctx: RequestContext,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let data = rt.create(ctx, body).await?;
    Ok(success_one(data))
}

pub async fn read(
    State(rt): ViewState,
    ctx: RequestContext,
    Path(pk): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let data = rt.get(ctx, &pk).await?;
    Ok(success_one_ok(data))
}

pub async fn update(
    State(rt): ViewState,
    ctx: RequestContext,
    Path(pk): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let data = rt.update(ctx, &pk, body, false).await?;
    Ok(success_one_ok(data))
}

pub async fn partial_update(
    State(rt): ViewState,
    ctx: RequestContext,
    Path(pk): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let data = rt.update(ctx, &pk, body, true).await?;
    Ok(success_one_ok(data))
}

pub async fn delete(
    State(rt): ViewState,
    ctx: RequestContext,
    Path(pk): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = rt.delete(ctx, &pk).await?;
    Ok(success_one_ok(Deleted { deleted }))
}

pub async fn list(
    State(rt): ViewState,
    ctx: RequestContext,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let rows = rt.list(ctx, params).await?;
    Ok(success_many(rows))
}

/// Custom method; `pk` is present for the kinds routed under `/{name}/:pk`.
pub async fn custom(
    rt: Arc<ViewRuntime>,
    kind: CustomKind,
    name: &str,
    ctx: RequestContext,
    pk: Option<String>,
    query: HashMap<String, String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let data = rt.custom(kind, name, ctx, pk.as_deref(), query, &body).await?;
    Ok(match kind {
        CustomKind::Post => success_one(data).into_response(),
        _ => success_one_ok(data).into_response(),
    })
}
