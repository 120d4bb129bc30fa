//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::jobs::{QueueError, StoreError};
use crate::references::{FileStoreError, MetadataError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
            AppError::Queue(ref e) => {
                tracing::error!("Queue error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "QUEUE_ERROR",
                    "The job could not be queued".to_string(),
                )
            },
            AppError::Storage(message) => {
                tracing::error!("Storage error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            },
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl From<FileStoreError> for AppError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::InvalidName(_) => AppError::Validation(err.to_string()),
            FileStoreError::DatabaseNotFound(_) | FileStoreError::UploadNotFound(_) => {
                AppError::NotFound(err.to_string())
            },
            FileStoreError::Io { .. } => AppError::Storage(err.to_string()),
        }
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Alias for Result with AppError
pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Queue(QueueError::Closed), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Storage("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_file_store_errors_map_to_client_errors() {
        let err: AppError = FileStoreError::InvalidName("../x".into()).into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = FileStoreError::DatabaseNotFound("x.fa".into()).into();
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("x.fa")));
    }
}
