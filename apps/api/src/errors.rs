use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::storage::{keys, StoreError};

/// Rejects empty values for a required field.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Rejects externally supplied ids that cannot be embedded in a storage key
/// (empty, `.`/`..`, or containing path separators).
pub fn require_path_segment(field: &str, value: &str) -> Result<(), AppError> {
    if keys::is_valid_path_segment(value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} is required and must not contain path separators"
        )))
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Transport failures only reach this type when the fallback cache cannot
/// apply (e.g. deletes, credential issuance); saves and reads absorb them at
/// the handler boundary instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Transport(msg) => AppError::Transport(msg),
            StoreError::Permission(msg) => AppError::Permission(msg),
            StoreError::Other(msg) => AppError::Storage(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Transport(msg) => {
                tracing::warn!("Transport failure surfaced to caller: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TRANSPORT_ERROR",
                    "The storage backend is unreachable".to_string(),
                )
            }
            AppError::Permission(msg) => {
                tracing::error!("Permission failure: {msg}");
                (
                    StatusCode::FORBIDDEN,
                    "PERMISSION_ERROR",
                    "The storage backend rejected the request".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
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
