use std::collections::HashMap;

use lesson_core::model::{ChallengeId, ChallengeOption, LessonId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_challenge_row, map_option_row, ser};
use crate::repository::{
    LessonRecord, LessonRepository, LoadedLesson, ProgressRepository, StorageError,
};

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let lesson_id = id_to_i64("lesson_id", lesson.id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO lessons (id, title)
                VALUES (?1, ?2)
                ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(lesson_id)
        .bind(&lesson.title)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for challenge in &lesson.challenges {
            let challenge_id = id_to_i64("challenge_id", challenge.id().value())?;
            sqlx::query(
                r"
                    INSERT INTO challenges (id, lesson_id, kind, position, question, video_url)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(id) DO UPDATE SET
                        lesson_id = excluded.lesson_id,
                        kind = excluded.kind,
                        position = excluded.position,
                        question = excluded.question,
                        video_url = excluded.video_url
                ",
            )
            .bind(challenge_id)
            .bind(lesson_id)
            .bind(challenge.kind().as_str())
            .bind(i64::from(challenge.order()))
            .bind(challenge.question())
            .bind(challenge.video_url())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            // options are replaced wholesale; progress rows hang off the challenge
            sqlx::query("DELETE FROM challenge_options WHERE challenge_id = ?1")
                .bind(challenge_id)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;

            for option in challenge.options() {
                sqlx::query(
                    r"
                        INSERT INTO challenge_options (id, challenge_id, text, media_url, correct)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(id_to_i64("option_id", option.id.value())?)
                .bind(challenge_id)
                .bind(&option.text)
                .bind(option.media_url.as_deref())
                .bind(i64::from(option.correct))
                .execute(&mut *tx)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
                    other => conn(other),
                })?;
            }
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            lesson_id = %lesson.id,
            challenges = lesson.challenges.len(),
            "lesson stored"
        );
        Ok(())
    }

    async fn load_lesson(
        &self,
        user: &UserId,
        lesson_id: LessonId,
    ) -> Result<LoadedLesson, StorageError> {
        let id = id_to_i64("lesson_id", lesson_id.value())?;

        let title: String = sqlx::query("SELECT title FROM lessons WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?
            .try_get("title")
            .map_err(ser)?;

        let challenge_rows = sqlx::query(
            r"
                SELECT id, kind, position, question, video_url
                FROM challenges
                WHERE lesson_id = ?1
                ORDER BY position ASC, id ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let option_rows = sqlx::query(
            r"
                SELECT o.id, o.challenge_id, o.text, o.media_url, o.correct
                FROM challenge_options o
                JOIN challenges c ON c.id = o.challenge_id
                WHERE c.lesson_id = ?1
                ORDER BY o.challenge_id ASC, o.id ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut options: HashMap<ChallengeId, Vec<ChallengeOption>> = HashMap::new();
        for row in &option_rows {
            let (challenge_id, option) = map_option_row(row)?;
            options.entry(challenge_id).or_default().push(option);
        }

        let mut challenges = Vec::with_capacity(challenge_rows.len());
        for row in &challenge_rows {
            let row = map_challenge_row(row)?;
            let opts = options.remove(&row.id).unwrap_or_default();
            challenges.push(row.into_challenge(opts)?);
        }

        let completed = self.completed_challenges(user).await?;
        Ok(LoadedLesson::for_user(
            LessonRecord {
                id: lesson_id,
                title,
                challenges,
            },
            &completed,
        ))
    }
}
