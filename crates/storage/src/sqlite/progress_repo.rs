use std::collections::HashSet;

use chrono::{DateTime, Utc};
use lesson_core::model::{ChallengeId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{challenge_id_from_i64, conn, id_to_i64, ser};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_challenge_progress(
        &self,
        user: &UserId,
        challenge_id: ChallengeId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO challenge_progress (user_id, challenge_id, completed, updated_at)
                VALUES (?1, ?2, 1, ?3)
                ON CONFLICT(user_id, challenge_id) DO UPDATE SET
                    completed = 1,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(user.as_str())
        .bind(id_to_i64("challenge_id", challenge_id.value())?)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        tracing::debug!(user_id = %user, %challenge_id, "challenge progress stored");
        Ok(())
    }

    async fn completed_challenges(
        &self,
        user: &UserId,
    ) -> Result<HashSet<ChallengeId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT challenge_id
                FROM challenge_progress
                WHERE user_id = ?1 AND completed = 1
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| challenge_id_from_i64(row.try_get::<i64, _>("challenge_id").map_err(ser)?))
            .collect()
    }
}
