//! Courier Database Crate
//!
//! This crate provides storage for the Courier messaging core: connection
//! management, migrations, entity definitions and repository
//! implementations over SQLite.

use courier_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

// Re-export repositories
pub use repos::{MessageRepository, ParticipantRepository, ReadOutcome, ThreadRepository};

// Re-export entities
pub use entities::{
    Message, MessageKind, MessageStatus, NewMessage, Participant, ParticipantRole, Thread,
    ThreadSummary,
};

// Re-export types
pub use types::{StoreError, StoreResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> StoreResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    Ok(pool)
}
