//! Repository for message data access operations.

use crate::entities::{Message, MessageKind, MessageStatus, NewMessage, Thread};
use crate::types::{StoreError, StoreResult};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

const SELECT_COLUMNS: &str = "id, public_id, thread_id, thread_public_id, seq, sender_id, \
     recipient_id, body, kind, attachment_ref, status, created_at, delivered_at, read_at";

/// Effect of a bulk read transition: which sequence numbers actually
/// moved, plus the recomputed unread counter for the acking participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub updated: Vec<Message>,
    pub unread_count: i64,
}

/// Repository for message database operations
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message to a thread, assigning the next sequence number.
    ///
    /// The seq is computed in the INSERT itself; if two appends race for
    /// the same slot the UNIQUE(thread_id, seq) index rejects the loser
    /// with `SequenceConflict`, which callers absorb with a bounded retry.
    pub async fn append(
        &self,
        thread: &Thread,
        sender_id: &str,
        recipient_id: &str,
        content: &NewMessage,
    ) -> StoreResult<Message> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO messages (public_id, thread_id, thread_public_id, seq, sender_id, \
             recipient_id, body, kind, attachment_ref, status, created_at)
             VALUES (?, ?, ?, \
             (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE thread_id = ?), \
             ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(thread.id)
        .bind(&thread.public_id)
        .bind(thread.id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(&content.body)
        .bind(content.kind.as_str())
        .bind(content.attachment_ref.as_deref())
        .bind(MessageStatus::Sent.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        let message = self
            .find_by_public_id(&public_id)
            .await?
            .ok_or(StoreError::MessageNotFound)?;

        info!(
            message_id = %message.public_id,
            thread_id = %thread.public_id,
            seq = message.seq,
            sender_id,
            "appended message"
        );

        Ok(message)
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> StoreResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(Self::row_to_message).transpose()
    }

    /// Messages of a thread in ascending seq order, strictly after
    /// `since_seq`, at most `limit` rows. Restartable from the last
    /// returned seq.
    pub async fn list_since(
        &self,
        thread_id: i64,
        since_seq: i64,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE thread_id = ? AND seq > ? ORDER BY seq ASC LIMIT ?"
        ))
        .bind(thread_id)
        .bind(since_seq)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    pub async fn last_message(&self, thread_id: i64) -> StoreResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE thread_id = ? ORDER BY seq DESC LIMIT 1"
        ))
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(Self::row_to_message).transpose()
    }

    /// Unread = addressed to the participant and not yet read.
    pub async fn unread_count(&self, thread_id: i64, participant_id: &str) -> StoreResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM messages
             WHERE thread_id = ? AND recipient_id = ? AND status != 'read'",
        )
        .bind(thread_id)
        .bind(participant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.try_get("count").map_err(StoreError::from_sqlx)
    }

    /// Forward-only transition to `delivered`. Returns the updated message,
    /// or `None` when the message was already delivered or read.
    pub async fn mark_delivered(&self, public_id: &str) -> StoreResult<Option<Message>> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE messages SET status = 'delivered', delivered_at = ?
             WHERE public_id = ? AND status = 'sent'",
        )
        .bind(&now)
        .bind(public_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_public_id(public_id).await
    }

    /// Bulk forward-only transition to `read` for every message addressed
    /// to `participant_id` with seq <= `upto_seq`. Collapses a pending
    /// `sent` straight to `read` (delivered_at is backfilled for the audit
    /// trail, but no delivered event ever fires for these).
    pub async fn mark_read_upto(
        &self,
        thread_id: i64,
        participant_id: &str,
        upto_seq: i64,
    ) -> StoreResult<ReadOutcome> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        let rows = sqlx::query(
            "SELECT public_id FROM messages
             WHERE thread_id = ? AND recipient_id = ? AND seq <= ? AND status != 'read'
             ORDER BY seq ASC",
        )
        .bind(thread_id)
        .bind(participant_id)
        .bind(upto_seq)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        sqlx::query(
            "UPDATE messages
             SET status = 'read', read_at = ?, delivered_at = COALESCE(delivered_at, ?)
             WHERE thread_id = ? AND recipient_id = ? AND seq <= ? AND status != 'read'",
        )
        .bind(&now)
        .bind(&now)
        .bind(thread_id)
        .bind(participant_id)
        .bind(upto_seq)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        tx.commit().await.map_err(StoreError::from_sqlx)?;

        let mut updated = Vec::with_capacity(rows.len());
        for row in rows {
            let public_id: String = row.try_get("public_id").map_err(StoreError::from_sqlx)?;
            match self.find_by_public_id(&public_id).await? {
                Some(message) => updated.push(message),
                None => warn!(message_id = %public_id, "read-marked message vanished"),
            }
        }

        let unread_count = self.unread_count(thread_id, participant_id).await?;

        Ok(ReadOutcome {
            updated,
            unread_count,
        })
    }

    fn row_to_message(row: sqlx::sqlite::SqliteRow) -> StoreResult<Message> {
        let status: String = row.try_get("status").map_err(StoreError::from_sqlx)?;
        let kind: String = row.try_get("kind").map_err(StoreError::from_sqlx)?;

        Ok(Message {
            id: row.try_get("id").map_err(StoreError::from_sqlx)?,
            public_id: row.try_get("public_id").map_err(StoreError::from_sqlx)?,
            thread_id: row.try_get("thread_id").map_err(StoreError::from_sqlx)?,
            thread_public_id: row
                .try_get("thread_public_id")
                .map_err(StoreError::from_sqlx)?,
            seq: row.try_get("seq").map_err(StoreError::from_sqlx)?,
            sender_id: row.try_get("sender_id").map_err(StoreError::from_sqlx)?,
            recipient_id: row.try_get("recipient_id").map_err(StoreError::from_sqlx)?,
            body: row.try_get("body").map_err(StoreError::from_sqlx)?,
            kind: MessageKind::from(kind.as_str()),
            attachment_ref: row
                .try_get("attachment_ref")
                .map_err(StoreError::from_sqlx)?,
            status: MessageStatus::from(status.as_str()),
            created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
            delivered_at: row.try_get("delivered_at").map_err(StoreError::from_sqlx)?,
            read_at: row.try_get("read_at").map_err(StoreError::from_sqlx)?,
        })
    }
}
