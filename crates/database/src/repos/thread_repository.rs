//! Repository for thread data access operations.

use crate::entities::Thread;
use crate::types::{StoreError, StoreResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Repository for thread database operations
pub struct ThreadRepository {
    pool: SqlitePool,
}

impl ThreadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find or create the thread for a canonical participant pair.
    ///
    /// Safe under concurrent first-contact calls: the insert is a no-op
    /// when another writer won the race, and the re-select returns the
    /// single surviving row either way.
    pub async fn resolve_pair(
        &self,
        participant_low: &str,
        participant_high: &str,
        booking_ref: Option<&str>,
    ) -> StoreResult<Thread> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO threads (public_id, participant_low, participant_high, booking_ref, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(participant_low, participant_high) DO NOTHING",
        )
        .bind(&public_id)
        .bind(participant_low)
        .bind(participant_high)
        .bind(booking_ref)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() > 0 {
            info!(
                public_id = %public_id,
                participant_low,
                participant_high,
                "created new thread"
            );
        }

        self.find_by_pair(participant_low, participant_high)
            .await?
            .ok_or(StoreError::ThreadNotFound)
    }

    pub async fn find_by_pair(
        &self,
        participant_low: &str,
        participant_high: &str,
    ) -> StoreResult<Option<Thread>> {
        let row = sqlx::query(
            "SELECT id, public_id, participant_low, participant_high, booking_ref, archived, created_at
             FROM threads WHERE participant_low = ? AND participant_high = ?",
        )
        .bind(participant_low)
        .bind(participant_high)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(Self::row_to_thread).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> StoreResult<Option<Thread>> {
        let row = sqlx::query(
            "SELECT id, public_id, participant_low, participant_high, booking_ref, archived, created_at
             FROM threads WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(Self::row_to_thread).transpose()
    }

    /// All threads a participant belongs to, unordered; callers sort by
    /// activity once last messages are attached.
    pub async fn find_for_participant(&self, participant_id: &str) -> StoreResult<Vec<Thread>> {
        let rows = sqlx::query(
            "SELECT id, public_id, participant_low, participant_high, booking_ref, archived, created_at
             FROM threads WHERE participant_low = ? OR participant_high = ?",
        )
        .bind(participant_id)
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(Self::row_to_thread).collect()
    }

    /// Soft-archive a thread. Administrative action; threads are never deleted.
    pub async fn archive(&self, public_id: &str) -> StoreResult<Thread> {
        let result = sqlx::query("UPDATE threads SET archived = 1 WHERE public_id = ?")
            .bind(public_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ThreadNotFound);
        }

        info!(public_id, "archived thread");

        self.find_by_public_id(public_id)
            .await?
            .ok_or(StoreError::ThreadNotFound)
    }

    fn row_to_thread(row: sqlx::sqlite::SqliteRow) -> StoreResult<Thread> {
        Ok(Thread {
            id: row.try_get("id").map_err(StoreError::from_sqlx)?,
            public_id: row.try_get("public_id").map_err(StoreError::from_sqlx)?,
            participant_low: row
                .try_get("participant_low")
                .map_err(StoreError::from_sqlx)?,
            participant_high: row
                .try_get("participant_high")
                .map_err(StoreError::from_sqlx)?,
            booking_ref: row.try_get("booking_ref").map_err(StoreError::from_sqlx)?,
            archived: row.try_get("archived").map_err(StoreError::from_sqlx)?,
            created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ParticipantRole;
    use crate::repos::ParticipantRepository;
    use crate::test_support::create_test_pool;

    async fn seed_pair(pool: &SqlitePool) {
        let participants = ParticipantRepository::new(pool.clone());
        participants
            .upsert("alice", "Alice", ParticipantRole::Customer)
            .await
            .unwrap();
        participants
            .upsert("bob", "Bob", ParticipantRole::Provider)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resolve_pair_creates_once() {
        let (pool, _dir) = create_test_pool().await;
        seed_pair(&pool).await;
        let repo = ThreadRepository::new(pool);

        let first = repo.resolve_pair("alice", "bob", None).await.unwrap();
        let second = repo.resolve_pair("alice", "bob", None).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.public_id, second.public_id);
    }

    #[tokio::test]
    async fn resolve_pair_survives_concurrent_first_contact() {
        let (pool, _dir) = create_test_pool().await;
        seed_pair(&pool).await;
        let repo = std::sync::Arc::new(ThreadRepository::new(pool));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.resolve_pair("alice", "bob", None).await.unwrap().id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn booking_ref_is_kept_from_first_resolution() {
        let (pool, _dir) = create_test_pool().await;
        seed_pair(&pool).await;
        let repo = ThreadRepository::new(pool);

        let first = repo
            .resolve_pair("alice", "bob", Some("booking-77"))
            .await
            .unwrap();
        assert_eq!(first.booking_ref.as_deref(), Some("booking-77"));

        // A later resolution with a different ref does not rewrite history.
        let second = repo
            .resolve_pair("alice", "bob", Some("booking-99"))
            .await
            .unwrap();
        assert_eq!(second.booking_ref.as_deref(), Some("booking-77"));
    }

    #[tokio::test]
    async fn archive_flags_thread() {
        let (pool, _dir) = create_test_pool().await;
        seed_pair(&pool).await;
        let repo = ThreadRepository::new(pool);

        let thread = repo.resolve_pair("alice", "bob", None).await.unwrap();
        let archived = repo.archive(&thread.public_id).await.unwrap();
        assert!(archived.archived);

        assert!(matches!(
            repo.archive("missing").await,
            Err(StoreError::ThreadNotFound)
        ));
    }
}
