//! Shared application state for the gateway

use std::sync::Arc;
use std::time::Duration;

use courier_config::{DatabaseConfig, RealtimeConfig};
use courier_messaging::{MessageService, SyncService, ThreadService};
use courier_realtime::{RoomRouter, TypingSignaler};
use sqlx::SqlitePool;

use crate::error::{GatewayError, GatewayResult};

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Room fan-out router (also the durable services' event sink)
    pub router: Arc<RoomRouter>,
    /// Typing presence signaler
    pub typing: TypingSignaler,
    /// Thread registry
    pub thread_service: Arc<ThreadService>,
    /// Message store + delivery state machine
    pub message_service: Arc<MessageService>,
    /// Reconnect/backfill protocol
    pub sync_service: Arc<SyncService>,
}

impl GatewayState {
    /// Create a new gateway state with all services initialized
    pub fn new(pool: SqlitePool, realtime: &RealtimeConfig) -> Self {
        let router = Arc::new(RoomRouter::new());
        let typing = TypingSignaler::new(
            router.clone(),
            Duration::from_secs(realtime.typing_ttl_seconds),
        );

        let thread_service = Arc::new(ThreadService::new(pool.clone()));
        let message_service = Arc::new(MessageService::new(
            pool.clone(),
            router.clone(),
            realtime.append_retries,
        ));
        let sync_service = Arc::new(SyncService::new(pool.clone(), realtime.backfill_limit));

        Self {
            pool,
            router,
            typing,
            thread_service,
            message_service,
            sync_service,
        }
    }

    /// Create gateway state from database configuration
    pub async fn from_config(
        database: &DatabaseConfig,
        realtime: &RealtimeConfig,
    ) -> GatewayResult<Self> {
        let pool = courier_database::initialize_database(database)
            .await
            .map_err(|e| {
                GatewayError::DatabaseError(format!("failed to initialize database: {e}"))
            })?;

        Ok(Self::new(pool, realtime))
    }
}
