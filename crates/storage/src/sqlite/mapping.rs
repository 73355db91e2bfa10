use lesson_core::model::{
    Challenge, ChallengeId, ChallengeKind, ChallengeOption, LessonId, OptionId, UserId,
};
use sqlx::Row;

use crate::repository::{LessonAnalyticsRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn challenge_id_from_i64(v: i64) -> Result<ChallengeId, StorageError> {
    Ok(ChallengeId::new(i64_to_u64("challenge_id", v)?))
}

pub(crate) fn option_id_from_i64(v: i64) -> Result<OptionId, StorageError> {
    Ok(OptionId::new(i64_to_u64("option_id", v)?))
}

/// Columns of a `challenges` row, before its options are attached.
pub(crate) struct ChallengeRow {
    pub id: ChallengeId,
    pub kind: ChallengeKind,
    pub position: u32,
    pub question: String,
    pub video_url: Option<String>,
}

impl ChallengeRow {
    pub(crate) fn into_challenge(
        self,
        options: Vec<ChallengeOption>,
    ) -> Result<Challenge, StorageError> {
        Challenge::new(
            self.id,
            self.kind,
            self.position,
            self.question,
            self.video_url,
            options,
        )
        .map_err(ser)
    }
}

pub(crate) fn map_challenge_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChallengeRow, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    Ok(ChallengeRow {
        id: challenge_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        kind: kind.parse::<ChallengeKind>().map_err(ser)?,
        position: u32_from_i64("position", row.try_get::<i64, _>("position").map_err(ser)?)?,
        question: row.try_get("question").map_err(ser)?,
        video_url: row.try_get("video_url").map_err(ser)?,
    })
}

/// Maps an option row to `(owning challenge, option)`.
pub(crate) fn map_option_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<(ChallengeId, ChallengeOption), StorageError> {
    let challenge_id = challenge_id_from_i64(row.try_get::<i64, _>("challenge_id").map_err(ser)?)?;
    let mut option = ChallengeOption::new(
        option_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        row.try_get::<i64, _>("correct").map_err(ser)? != 0,
    );
    option.media_url = row.try_get("media_url").map_err(ser)?;
    Ok((challenge_id, option))
}

pub(crate) fn map_analytics_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LessonAnalyticsRecord, StorageError> {
    let total_time: i64 = row.try_get("total_time_seconds").map_err(ser)?;
    Ok(LessonAnalyticsRecord {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        lesson_id: lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        total_challenges: u32_from_i64(
            "total_challenges",
            row.try_get::<i64, _>("total_challenges").map_err(ser)?,
        )?,
        correct_first_try: u32_from_i64(
            "correct_first_try",
            row.try_get::<i64, _>("correct_first_try").map_err(ser)?,
        )?,
        total_retries: u32_from_i64(
            "total_retries",
            row.try_get::<i64, _>("total_retries").map_err(ser)?,
        )?,
        total_time_seconds: i64_to_u64("total_time_seconds", total_time)?,
        points_earned: u32_from_i64(
            "points_earned",
            row.try_get::<i64, _>("points_earned").map_err(ser)?,
        )?,
        challenge_details: row.try_get("challenge_details").map_err(ser)?,
        ai_feedback: row.try_get("ai_feedback").map_err(ser)?,
    })
}
