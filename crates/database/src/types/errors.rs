//! Error types for the storage layer

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("Thread not found")]
    ThreadNotFound,

    #[error("Message not found")]
    MessageNotFound,

    /// Two appends raced for the same (thread, seq) slot. Retried
    /// internally by the store; never shown to callers.
    #[error("Sequence conflict")]
    SequenceConflict,
}

impl StoreError {
    /// Map an sqlx error, folding unique-key violations on the
    /// (thread_id, seq) index into the internal retry condition.
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::SequenceConflict,
            _ => StoreError::Database(error.to_string()),
        }
    }
}
