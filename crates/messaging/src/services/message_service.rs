//! Message store orchestration and the delivery state machine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use courier_database::{
    Message, MessageRepository, NewMessage, ReadOutcome, StoreError, Thread, ThreadRepository,
    ThreadSummary,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::types::{DeliveryReceipt, EventSink, MessagingError, MessagingResult};
use crate::utils::validate_content;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// Service owning durable message writes and status transitions.
///
/// Appends to one thread are funnelled through a per-thread async lock so
/// sequence assignment and fan-out happen in one ordered critical section;
/// appends to different threads proceed fully in parallel.
pub struct MessageService {
    threads: ThreadRepository,
    messages: MessageRepository,
    sink: Arc<dyn EventSink>,
    append_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    append_retries: u32,
}

impl MessageService {
    pub fn new(pool: SqlitePool, sink: Arc<dyn EventSink>, append_retries: u32) -> Self {
        Self {
            threads: ThreadRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            sink,
            append_locks: Mutex::new(HashMap::new()),
            append_retries: append_retries.max(1),
        }
    }

    /// Append a message to a thread and fan it out.
    ///
    /// When the push reaches a live connection of the recipient the
    /// message advances to `delivered` before this returns; with no live
    /// recipient it stays `sent` — a routing fact, not an error.
    pub async fn append(
        &self,
        thread_public_id: &str,
        sender_id: &str,
        content: &NewMessage,
    ) -> MessagingResult<Message> {
        validate_content(content)?;

        let thread = self.get_thread(thread_public_id).await?;
        super::ThreadService::require_member(&thread, sender_id)?;
        if thread.archived {
            return Err(MessagingError::ThreadArchived);
        }

        let recipient_id = thread
            .other_participant(sender_id)
            .ok_or(MessagingError::Unauthorized)?
            .to_string();

        let lock = self.append_lock(thread.id);
        let _guard = lock.lock().await;

        let message = self
            .append_with_retry(&thread, sender_id, &recipient_id, content)
            .await?;

        let recipient_reached = self.sink.message_created(&thread, &message);
        if !recipient_reached {
            info!(
                message_id = %message.public_id,
                thread_id = %thread.public_id,
                "no live recipient, message stays sent"
            );
            return Ok(message);
        }

        // Push confirmed: advance to delivered. Best effort; a missed
        // transition self-heals on the recipient's next read ack.
        match self.messages.mark_delivered(&message.public_id).await {
            Ok(Some(delivered)) => {
                let receipt = DeliveryReceipt::for_message(&delivered, &recipient_id);
                self.sink.status_changed(&thread, &receipt);
                Ok(delivered)
            }
            Ok(None) => Ok(message),
            Err(error) => {
                warn!(
                    message_id = %message.public_id,
                    %error,
                    "failed to record delivered transition"
                );
                Ok(message)
            }
        }
    }

    /// Explicit delivery acknowledgement from the recipient's client.
    /// Returns `None` when the message already was delivered or read.
    pub async fn ack_delivered(
        &self,
        message_public_id: &str,
        actor_id: &str,
    ) -> MessagingResult<Option<Message>> {
        let message = self
            .messages
            .find_by_public_id(message_public_id)
            .await?
            .ok_or(MessagingError::MessageNotFound)?;

        if message.recipient_id != actor_id {
            return Err(MessagingError::Unauthorized);
        }

        let Some(delivered) = self.messages.mark_delivered(message_public_id).await? else {
            return Ok(None);
        };

        let thread = self.get_thread(&delivered.thread_public_id).await?;
        let receipt = DeliveryReceipt::for_message(&delivered, actor_id);
        self.sink.status_changed(&thread, &receipt);

        Ok(Some(delivered))
    }

    /// Bulk read transition for everything addressed to `actor_id` up to
    /// and including `upto_seq`. Emits one status event per message that
    /// actually moved; messages still `sent` collapse straight to `read`.
    pub async fn mark_thread_read(
        &self,
        thread_public_id: &str,
        actor_id: &str,
        upto_seq: i64,
    ) -> MessagingResult<ReadOutcome> {
        let thread = self.get_thread(thread_public_id).await?;
        super::ThreadService::require_member(&thread, actor_id)?;

        let outcome = self
            .messages
            .mark_read_upto(thread.id, actor_id, upto_seq)
            .await?;

        for message in &outcome.updated {
            let receipt = DeliveryReceipt::for_message(message, actor_id);
            self.sink.status_changed(&thread, &receipt);
        }

        if !outcome.updated.is_empty() {
            info!(
                thread_id = %thread.public_id,
                actor_id,
                upto_seq,
                read = outcome.updated.len(),
                unread_left = outcome.unread_count,
                "marked thread read"
            );
        }

        Ok(outcome)
    }

    /// Fetch one message; visible only to the two thread members.
    pub async fn get_message(
        &self,
        message_public_id: &str,
        caller_id: &str,
    ) -> MessagingResult<Message> {
        let message = self
            .messages
            .find_by_public_id(message_public_id)
            .await?
            .ok_or(MessagingError::MessageNotFound)?;

        if message.sender_id != caller_id && message.recipient_id != caller_id {
            return Err(MessagingError::Unauthorized);
        }

        Ok(message)
    }

    /// Messages strictly after `since_seq` in ascending seq order.
    pub async fn list_since(
        &self,
        thread_public_id: &str,
        caller_id: &str,
        since_seq: i64,
        limit: Option<i64>,
    ) -> MessagingResult<Vec<Message>> {
        let thread = self.get_thread(thread_public_id).await?;
        super::ThreadService::require_member(&thread, caller_id)?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self.messages.list_since(thread.id, since_seq, limit).await?)
    }

    /// Conversation list for one participant, most recent activity first.
    pub async fn list_threads(&self, participant_id: &str) -> MessagingResult<Vec<ThreadSummary>> {
        let threads = self.threads.find_for_participant(participant_id).await?;

        let mut summaries = Vec::with_capacity(threads.len());
        for thread in threads {
            let other_participant = thread
                .other_participant(participant_id)
                .unwrap_or_default()
                .to_string();
            let last_message = self.messages.last_message(thread.id).await?;
            let unread_count = self.messages.unread_count(thread.id, participant_id).await?;
            let last_activity_at = last_message
                .as_ref()
                .map(|m| m.created_at.clone())
                .unwrap_or_else(|| thread.created_at.clone());

            summaries.push(ThreadSummary {
                thread_id: thread.public_id,
                other_participant,
                booking_ref: thread.booking_ref,
                archived: thread.archived,
                last_message,
                unread_count,
                last_activity_at,
            });
        }

        summaries.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(summaries)
    }

    async fn get_thread(&self, public_id: &str) -> MessagingResult<Thread> {
        self.threads
            .find_by_public_id(public_id)
            .await?
            .ok_or(MessagingError::ThreadNotFound)
    }

    async fn append_with_retry(
        &self,
        thread: &Thread,
        sender_id: &str,
        recipient_id: &str,
        content: &NewMessage,
    ) -> MessagingResult<Message> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .messages
                .append(thread, sender_id, recipient_id, content)
                .await
            {
                Ok(message) => return Ok(message),
                Err(StoreError::SequenceConflict) if attempt < self.append_retries => {
                    warn!(
                        thread_id = %thread.public_id,
                        attempt,
                        "sequence conflict on append, retrying"
                    );
                }
                Err(StoreError::Database(error)) if attempt < self.append_retries => {
                    warn!(
                        thread_id = %thread.public_id,
                        attempt,
                        %error,
                        "storage error on append, retrying"
                    );
                }
                Err(StoreError::SequenceConflict) | Err(StoreError::Database(_)) => {
                    return Err(MessagingError::WriteFailed);
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn append_lock(&self, thread_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.append_locks.lock().expect("append lock map poisoned");
        locks
            .entry(thread_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
