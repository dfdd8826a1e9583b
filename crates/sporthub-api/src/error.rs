//! SportHub: API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sporthub_core::error::DomainError;
use thiserror::Error;
use tracing::{error, warn};

/// Startup errors for the API servers.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorBody {
    /// Builds a response with this body.
    pub fn into_response(status: StatusCode, error: &'static str, message: String) -> Response {
        (status, Json(Self { error, message })).into_response()
    }
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::DuplicateBooking { .. } => (StatusCode::CONFLICT, "duplicate_booking"),
            DomainError::NoCapacity { .. } => (StatusCode::CONFLICT, "no_capacity"),
            DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            DomainError::Timeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "timeout"),
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        // Validation and infrastructure details stay in the logs.
        let message = match &self.0 {
            DomainError::Validation(detail) => {
                warn!(detail = %detail, "request rejected");
                "invalid request".to_owned()
            }
            DomainError::Infrastructure(detail) => {
                error!(detail = %detail, "request failed");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };

        ErrorBody::into_response(status, error_code, message)
    }
}
