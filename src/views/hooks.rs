//! User-overridable hooks around generated operations, and request guards.
//!
//! Validation and pre-hooks run inline and can fail the request. Post-hooks (`on_*`)
//! are spawned as detached tasks after the write: there is no delivery guarantee, no
//! ordering relative to the response, and their errors are only logged.

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::Record;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

#[async_trait]
pub trait ViewHooks: Send + Sync + 'static {
    async fn create_validation(&self, _ctx: &RequestContext, _data: &Record) -> Result<(), AppError> {
        Ok(())
    }

    async fn pre_create(&self, _ctx: &RequestContext, _data: &Record) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_create(&self, _ctx: RequestContext, _instance: Record) -> Result<(), AppError> {
        Ok(())
    }

    async fn pre_get(&self, _ctx: &RequestContext, _pk: &Value) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_get(&self, _ctx: RequestContext, _instance: Record) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_validation(&self, _ctx: &RequestContext) -> Result<(), AppError> {
        Ok(())
    }

    async fn pre_list(&self, _ctx: &RequestContext) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_list(&self, _ctx: RequestContext) -> Result<(), AppError> {
        Ok(())
    }

    /// Shared by update and partial_update; `data` holds only the fields being written.
    async fn update_validation(&self, _ctx: &RequestContext, _pk: &Value, _data: &Record) -> Result<(), AppError> {
        Ok(())
    }

    async fn pre_update(&self, _ctx: &RequestContext, _pk: &Value, _data: &Record) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_update(&self, _ctx: RequestContext, _instance: Record) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete_validation(&self, _ctx: &RequestContext, _pk: &Value) -> Result<(), AppError> {
        Ok(())
    }

    async fn pre_delete(&self, _ctx: &RequestContext, _pk: &Value) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_delete(&self, _ctx: RequestContext, _pk: Value, _deleted: bool) -> Result<(), AppError> {
        Ok(())
    }
}

/// Hooks that do nothing.
pub struct NoHooks;

impl ViewHooks for NoHooks {}

/// Request check run before an operation, e.g. authentication. Fails the request with its error.
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn check(&self, ctx: &RequestContext) -> Result<(), AppError>;
}

/// Requires `Authorization: Bearer <token>`; the token itself is not inspected.
pub struct RequireBearer;

#[async_trait]
impl Guard for RequireBearer {
    async fn check(&self, ctx: &RequestContext) -> Result<(), AppError> {
        match ctx.bearer_token() {
            Some(_) => Ok(()),
            None => Err(AppError::Unauthorized("could not validate credentials".into())),
        }
    }
}

/// Fire-and-forget a post-hook. Failures are logged and dropped.
pub(crate) fn spawn_post_hook<F>(view: &str, hook: &'static str, fut: F)
where
    F: Future<Output = Result<(), AppError>> + Send + 'static,
{
    let view = view.to_string();
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::warn!(view = %view, hook, error = %e, "post-hook failed");
        }
    });
}
