//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use courier_messaging::MessagingError;
use serde_json::json;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::InternalError(_) | GatewayError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code, also used on the live channel.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            GatewayError::AuthorizationFailed(_) => "ACCESS_DENIED",
            GatewayError::InvalidRequest(_) => "INVALID_REQUEST",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Conflict(_) => "CONFLICT",
            GatewayError::InternalError(_) => "INTERNAL_ERROR",
            GatewayError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<MessagingError> for GatewayError {
    fn from(error: MessagingError) -> Self {
        match error {
            MessagingError::InvalidParticipant(id) => {
                GatewayError::InvalidRequest(format!("unknown participant: {id}"))
            }
            MessagingError::ThreadNotFound => {
                GatewayError::NotFound("thread not found".to_string())
            }
            MessagingError::MessageNotFound => {
                GatewayError::NotFound("message not found".to_string())
            }
            MessagingError::Unauthorized => {
                GatewayError::AuthorizationFailed("not a member of this thread".to_string())
            }
            MessagingError::ThreadArchived => {
                GatewayError::Conflict("thread is archived".to_string())
            }
            MessagingError::Validation(message) => GatewayError::InvalidRequest(message),
            MessagingError::WriteFailed => {
                GatewayError::InternalError("write failed".to_string())
            }
            MessagingError::Database(message) => GatewayError::DatabaseError(message),
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(error: sqlx::Error) -> Self {
        GatewayError::DatabaseError(error.to_string())
    }
}
