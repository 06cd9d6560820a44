//! Repository for participant data access operations.

use crate::entities::{Participant, ParticipantRole};
use crate::types::{StoreError, StoreResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Repository for participant database operations. Rows mirror accounts
/// owned by the marketplace; messaging only validates against them.
pub struct ParticipantRepository {
    pool: SqlitePool,
}

impl ParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a mirrored account row.
    pub async fn upsert(
        &self,
        id: &str,
        display_name: &str,
        role: ParticipantRole,
    ) -> StoreResult<Participant> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO participants (id, display_name, role, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name, role = excluded.role",
        )
        .bind(id)
        .bind(display_name)
        .bind(role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        info!(participant_id = id, "participant mirrored");

        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::ParticipantNotFound(id.to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<Participant>> {
        let row = sqlx::query(
            "SELECT id, display_name, role, created_at FROM participants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(|row| {
            let role: String = row.try_get("role").map_err(StoreError::from_sqlx)?;
            Ok(Participant {
                id: row.try_get("id").map_err(StoreError::from_sqlx)?,
                display_name: row.try_get("display_name").map_err(StoreError::from_sqlx)?,
                role: ParticipantRole::from(role.as_str()),
                created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
            })
        })
        .transpose()
    }

    pub async fn exists(&self, id: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM participants WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(row.is_some())
    }
}
