//! Thread registry: maps participant pairs to stable conversation identity.

use courier_database::{ParticipantRepository, Thread, ThreadRepository};
use sqlx::SqlitePool;
use tracing::info;

use crate::types::{MessagingError, MessagingResult};

/// Service owning thread identity. Threads are created lazily on first
/// contact and only ever archived, never deleted.
pub struct ThreadService {
    threads: ThreadRepository,
    participants: ParticipantRepository,
}

impl ThreadService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            threads: ThreadRepository::new(pool.clone()),
            participants: ParticipantRepository::new(pool),
        }
    }

    /// Resolve the thread for an unordered participant pair, creating it
    /// on first contact. Idempotent and race-safe: concurrent first calls
    /// for the same pair converge on one thread.
    pub async fn resolve_thread(
        &self,
        participant_a: &str,
        participant_b: &str,
        booking_ref: Option<&str>,
    ) -> MessagingResult<Thread> {
        if participant_a == participant_b {
            return Err(MessagingError::InvalidParticipant(
                participant_a.to_string(),
            ));
        }

        for id in [participant_a, participant_b] {
            if !self.participants.exists(id).await? {
                return Err(MessagingError::InvalidParticipant(id.to_string()));
            }
        }

        let (low, high) = Thread::canonical_pair(participant_a, participant_b);
        let thread = self.threads.resolve_pair(&low, &high, booking_ref).await?;

        Ok(thread)
    }

    pub async fn get_thread(&self, public_id: &str) -> MessagingResult<Thread> {
        self.threads
            .find_by_public_id(public_id)
            .await?
            .ok_or(MessagingError::ThreadNotFound)
    }

    /// Reject callers that are not one of the thread's two participants.
    pub fn require_member(thread: &Thread, participant_id: &str) -> MessagingResult<()> {
        if thread.is_member(participant_id) {
            Ok(())
        } else {
            Err(MessagingError::Unauthorized)
        }
    }

    /// Administrative soft flag; live rooms are unaffected, new appends
    /// are rejected by the store service.
    pub async fn archive_thread(&self, public_id: &str) -> MessagingResult<Thread> {
        let thread = self.threads.archive(public_id).await?;
        info!(thread_id = %thread.public_id, "thread archived");
        Ok(thread)
    }
}
