//! Error types for the messaging domain.

use courier_database::StoreError;
use thiserror::Error;

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Main error type for the messaging core
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Unknown participant: {0}")]
    InvalidParticipant(String),

    #[error("Thread not found")]
    ThreadNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Caller is not a member of this thread")]
    Unauthorized,

    #[error("Thread is archived")]
    ThreadArchived,

    #[error("Validation error: {0}")]
    Validation(String),

    /// Append retries exhausted. A send must never silently appear to
    /// succeed, so this surfaces instead of being swallowed.
    #[error("Write failed after retries")]
    WriteFailed,

    #[error("Database error: {0}")]
    Database(String),
}

impl MessagingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for MessagingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ParticipantNotFound(id) => MessagingError::InvalidParticipant(id),
            StoreError::ThreadNotFound => MessagingError::ThreadNotFound,
            StoreError::MessageNotFound => MessagingError::MessageNotFound,
            other => MessagingError::Database(other.to_string()),
        }
    }
}
