use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::ModelError;
use crate::pipeline::runner::RunInProgress;
use crate::templates::store::TemplateStoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    RunInProgress(#[from] RunInProgress),

    #[error("Model service error: {0}")]
    Model(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TemplateStoreError> for AppError {
    fn from(e: TemplateStoreError) -> Self {
        match e {
            TemplateStoreError::NotFound(id) => AppError::NotFound(format!("Template '{id}' not found")),
            TemplateStoreError::InvalidIdentifier(id) => {
                AppError::Validation(format!("Invalid template identifier '{id}'"))
            }
            TemplateStoreError::Io(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<ModelError> for AppError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Auth(msg) => AppError::Unauthorized(msg),
            other => AppError::Model(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR", msg.clone()),
            AppError::RunInProgress(e) => (StatusCode::CONFLICT, "RUN_IN_PROGRESS", e.to_string()),
            AppError::Model(msg) => {
                tracing::error!("Model error: {msg}");
                (StatusCode::BAD_GATEWAY, "MODEL_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
