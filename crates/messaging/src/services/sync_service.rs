//! Reconnect/backfill protocol.

use courier_database::{Message, MessageRepository, Thread, ThreadRepository};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::types::{MessagingError, MessagingResult};

/// Client-supplied cursor: the last sequence number it has seen per thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub thread_id: String,
    pub last_seq: i64,
}

/// One thread's backfill reply: the missed messages in seq order plus the
/// current unread count. `latest_seq` restarts the next batch when the
/// gap exceeded the batch limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub thread_id: String,
    pub messages: Vec<Message>,
    pub unread_count: i64,
    pub latest_seq: i64,
}

/// Reconciles a reconnecting client with server state. Typing signals are
/// ephemeral and never backfilled.
pub struct SyncService {
    threads: ThreadRepository,
    messages: MessageRepository,
    backfill_limit: i64,
}

impl SyncService {
    pub fn new(pool: SqlitePool, backfill_limit: i64) -> Self {
        Self {
            threads: ThreadRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            backfill_limit: backfill_limit.max(1),
        }
    }

    /// Backfill one thread for a reconnecting participant. The caller
    /// joins the connection to the room afterwards, closing the gap
    /// between missed history and live delivery.
    pub async fn sync_thread(
        &self,
        actor_id: &str,
        cursor: &SyncCursor,
    ) -> MessagingResult<(Thread, SyncBatch)> {
        let thread = self
            .threads
            .find_by_public_id(&cursor.thread_id)
            .await?
            .ok_or(MessagingError::ThreadNotFound)?;
        super::ThreadService::require_member(&thread, actor_id)?;

        let messages = self
            .messages
            .list_since(thread.id, cursor.last_seq, self.backfill_limit)
            .await?;
        let unread_count = self.messages.unread_count(thread.id, actor_id).await?;
        let latest_seq = messages.last().map(|m| m.seq).unwrap_or(cursor.last_seq);

        let batch = SyncBatch {
            thread_id: thread.public_id.clone(),
            messages,
            unread_count,
            latest_seq,
        };

        Ok((thread, batch))
    }
}
