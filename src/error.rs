//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Problems with settings or model declarations. Raised before any request is served.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid setting {key}: '{value}'")]
    InvalidSetting { key: &'static str, value: String },
    #[error("unsupported database url: {0}")]
    UnsupportedDatabaseUrl(String),
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("invalid model {model}: {reason}")]
    InvalidModel { model: String, reason: String },
    #[error("session manager already initialized")]
    AlreadyInitialized,
}

/// Route registration failures. Raised while views are compiled into routes.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("invalid method '{method}' on view {view}")]
    InvalidMethod { view: String, method: String },
    #[error("method '{method}' not found in view {view}")]
    MissingMethod { view: String, method: String },
    #[error("view {view} has no {direction} schema for '{method}'")]
    MissingSchema {
        view: String,
        method: String,
        direction: &'static str,
    },
    #[error("duplicate operation id: {0}")]
    DuplicateOperation(String),
    #[error("duplicate route: {verb} {path}")]
    DuplicateRoute { verb: &'static str, path: String },
    #[error("view {view} references unknown model '{model}'")]
    UnknownModel { view: String, model: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("attribute error: {0}")]
    Attribute(String),
    #[error("unique constraint violation: '{column}' with value '{value}' already exists")]
    UniqueViolation { column: String, value: String },
    #[error("relation error: {0}")]
    Relation(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("session manager is not initialized")]
    NotInitialized,
    #[error("schema: {0}")]
    Schema(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    /// Status and machine-readable code for the response body.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Registration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "registration_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Attribute(_) => (StatusCode::BAD_REQUEST, "attribute_error"),
            AppError::UniqueViolation { .. } => (StatusCode::CONFLICT, "unique_violation"),
            AppError::Relation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "relation_error"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotInitialized => (StatusCode::SERVICE_UNAVAILABLE, "not_initialized"),
            AppError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let details = match &self {
            AppError::UniqueViolation { column, .. } => Some(serde_json::json!({ "column": column })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
