use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Version 1: lessons, challenges with options, per-user progress and
/// lesson analytics.
const V1_SCHEMA: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS challenges (
            id INTEGER PRIMARY KEY,
            lesson_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            question TEXT NOT NULL,
            video_url TEXT,
            FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS challenge_options (
            id INTEGER PRIMARY KEY,
            challenge_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            media_url TEXT,
            correct INTEGER NOT NULL CHECK (correct IN (0, 1)),
            FOREIGN KEY (challenge_id) REFERENCES challenges(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS challenge_progress (
            user_id TEXT NOT NULL,
            challenge_id INTEGER NOT NULL,
            completed INTEGER NOT NULL DEFAULT 1 CHECK (completed IN (0, 1)),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, challenge_id),
            FOREIGN KEY (challenge_id) REFERENCES challenges(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lesson_analytics (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            lesson_id INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            total_challenges INTEGER NOT NULL CHECK (total_challenges >= 0),
            correct_first_try INTEGER NOT NULL CHECK (correct_first_try >= 0),
            total_retries INTEGER NOT NULL CHECK (total_retries >= 0),
            total_time_seconds INTEGER NOT NULL CHECK (total_time_seconds >= 0),
            points_earned INTEGER NOT NULL CHECK (points_earned >= 0),
            challenge_details TEXT NOT NULL,
            ai_feedback TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_challenges_lesson_position
            ON challenges (lesson_id, position, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_challenge_options_challenge
            ON challenge_options (challenge_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lesson_analytics_user_completed
            ON lesson_analytics (user_id, completed_at);
    ",
];

/// Brings the schema up to the latest version. Safe to call repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;
        for statement in V1_SCHEMA {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
