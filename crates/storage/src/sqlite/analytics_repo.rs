use lesson_core::model::UserId;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_analytics_row};
use crate::repository::{LessonAnalyticsRecord, LessonAnalyticsRepository, StorageError};

#[async_trait::async_trait]
impl LessonAnalyticsRepository for SqliteRepository {
    async fn insert_analytics(&self, record: &LessonAnalyticsRecord) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO lesson_analytics (
                    user_id, lesson_id, completed_at, total_challenges,
                    correct_first_try, total_retries, total_time_seconds,
                    points_earned, challenge_details, ai_feedback
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(record.user_id.as_str())
        .bind(id_to_i64("lesson_id", record.lesson_id.value())?)
        .bind(record.completed_at)
        .bind(i64::from(record.total_challenges))
        .bind(i64::from(record.correct_first_try))
        .bind(i64::from(record.total_retries))
        .bind(id_to_i64("total_time_seconds", record.total_time_seconds)?)
        .bind(i64::from(record.points_earned))
        .bind(&record.challenge_details)
        .bind(&record.ai_feedback)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_analytics(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<LessonAnalyticsRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    user_id, lesson_id, completed_at, total_challenges,
                    correct_first_try, total_retries, total_time_seconds,
                    points_earned, challenge_details, ai_feedback
                FROM lesson_analytics
                WHERE user_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(user.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_analytics_row).collect()
    }
}
