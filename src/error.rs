use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::UnknownRole;

/// SessionError
///
/// Failures talking to the session provider. The route guard never surfaces
/// these to the client; they resolve into a navigation outcome.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("session provider rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("malformed session provider response: {0}")]
    Malformed(String),
}

/// DirectoryError
///
/// Failures resolving an identity to its `users` record.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user directory query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    InvalidRole(#[from] UnknownRole),
}

/// RepositoryError
///
/// Failures of dashboard write operations, mapped to HTTP statuses for handlers.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    Invalid(String),
}

impl IntoResponse for RepositoryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RepositoryError::Database(e) => {
                tracing::error!("repository error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RepositoryError::NotFound(_) => StatusCode::NOT_FOUND,
            RepositoryError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        // Database details stay in the logs.
        let message = match &self {
            RepositoryError::Database(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// ApiError
///
/// Handler error: either a bare status (role checks, missing session) or a
/// repository failure with its own status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request rejected with status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        ApiError::Status(status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Status(status) => status.into_response(),
            ApiError::Repository(e) => e.into_response(),
        }
    }
}
