//! Event domain error types

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type for event operations
pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EventError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> (i32, &'static str) {
        match self {
            Self::NotFound { .. } => (1004, "NOT_FOUND"),
            Self::Validation(_) => (1001, "VALIDATION_ERROR"),
            Self::Database(_) => (1500, "DATABASE_ERROR"),
            Self::Serialization(_) => (1501, "SERIALIZATION_ERROR"),
            Self::Internal(_) => (1000, "INTERNAL_ERROR"),
        }
    }
}

impl From<bson::oid::Error> for EventError {
    fn from(err: bson::oid::Error) -> Self {
        Self::Validation(format!("Invalid ObjectId: {err}"))
    }
}

impl From<bson::ser::Error> for EventError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Serialization(format!("BSON serialization error: {err}"))
    }
}

impl From<bson::de::Error> for EventError {
    fn from(err: bson::de::Error) -> Self {
        Self::Serialization(format!("BSON deserialization error: {err}"))
    }
}

impl From<validator::ValidationErrors> for EventError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier
    pub error: String,
    pub message: String,
}

impl IntoResponse for EventError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, error) = self.error_code();

        // Store details stay in the logs.
        let message = if status.is_server_error() {
            tracing::error!(error_code = code, error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error_code = code, error = %self, "Request rejected");
            self.to_string()
        };

        let body = ErrorResponse {
            code,
            error: error.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
