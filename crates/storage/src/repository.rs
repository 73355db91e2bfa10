use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{
    Challenge, ChallengeDetail, ChallengeId, LessonId, LessonPerformanceSummary, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A lesson and its ordered challenges, as authored.
#[derive(Debug, Clone)]
pub struct LessonRecord {
    pub id: LessonId,
    pub title: String,
    pub challenges: Vec<Challenge>,
}

/// A lesson as seen by one user: challenges carry that user's `completed`
/// flags and `percentage` is the resume progress.
#[derive(Debug, Clone)]
pub struct LoadedLesson {
    pub id: LessonId,
    pub title: String,
    pub challenges: Vec<Challenge>,
    pub percentage: f64,
}

impl LoadedLesson {
    /// Apply a user's completed set to authored challenges.
    #[must_use]
    pub fn for_user(record: LessonRecord, completed: &HashSet<ChallengeId>) -> Self {
        let mut challenges: Vec<Challenge> = record
            .challenges
            .into_iter()
            .map(|c| {
                let done = completed.contains(&c.id());
                c.with_completed(done)
            })
            .collect();
        challenges.sort_by_key(Challenge::order);

        let done = challenges.iter().filter(|c| c.completed()).count();
        #[allow(clippy::cast_precision_loss)]
        let percentage = if challenges.is_empty() {
            0.0
        } else {
            done as f64 / challenges.len() as f64 * 100.0
        };

        Self {
            id: record.id,
            title: record.title,
            challenges,
            percentage,
        }
    }
}

/// Persisted shape of a finished lesson's performance and feedback.
///
/// `challenge_details` holds the per-challenge breakdown as JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonAnalyticsRecord {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
    pub total_challenges: u32,
    pub correct_first_try: u32,
    pub total_retries: u32,
    pub total_time_seconds: u64,
    pub points_earned: u32,
    pub challenge_details: String,
    pub ai_feedback: String,
}

impl LessonAnalyticsRecord {
    /// Build a record from a summary and the feedback text produced for it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the details cannot be encoded.
    pub fn from_summary(
        user_id: UserId,
        lesson_id: LessonId,
        summary: &LessonPerformanceSummary,
        ai_feedback: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        let challenge_details = serde_json::to_string(&summary.challenge_details)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self {
            user_id,
            lesson_id,
            completed_at,
            total_challenges: summary.total_challenges,
            correct_first_try: summary.correct_first_try,
            total_retries: summary.total_retries,
            total_time_seconds: summary.total_time_seconds,
            points_earned: summary.points_earned,
            challenge_details,
            ai_feedback: ai_feedback.into(),
        })
    }

    /// Decode the stored per-challenge breakdown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` on malformed JSON.
    pub fn details(&self) -> Result<Vec<ChallengeDetail>, StorageError> {
        serde_json::from_str(&self.challenge_details)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Store a lesson with its challenges, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError>;

    /// Load a lesson with `user`'s completion flags applied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson is missing, or other storage errors.
    async fn load_lesson(
        &self,
        user: &UserId,
        lesson_id: LessonId,
    ) -> Result<LoadedLesson, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Mark `challenge_id` as completed for `user` at `completed_at`.
    /// Idempotent; a repeat only moves the timestamp.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_challenge_progress(
        &self,
        user: &UserId,
        challenge_id: ChallengeId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Challenges `user` has completed, across all lessons.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn completed_challenges(&self, user: &UserId)
    -> Result<HashSet<ChallengeId>, StorageError>;
}

#[async_trait]
pub trait LessonAnalyticsRepository: Send + Sync {
    /// Append an analytics record and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn insert_analytics(&self, record: &LessonAnalyticsRecord) -> Result<i64, StorageError>;

    /// Most recent records for `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn list_analytics(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<LessonAnalyticsRecord>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lessons: Arc<Mutex<HashMap<LessonId, LessonRecord>>>,
    progress: Arc<Mutex<HashMap<UserId, HashSet<ChallengeId>>>>,
    analytics: Arc<Mutex<Vec<LessonAnalyticsRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(poisoned)?;
        guard.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn load_lesson(
        &self,
        user: &UserId,
        lesson_id: LessonId,
    ) -> Result<LoadedLesson, StorageError> {
        let record = {
            let guard = self.lessons.lock().map_err(poisoned)?;
            guard.get(&lesson_id).cloned().ok_or(StorageError::NotFound)?
        };
        let completed = self.completed_challenges(user).await?;
        Ok(LoadedLesson::for_user(record, &completed))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_challenge_progress(
        &self,
        user: &UserId,
        challenge_id: ChallengeId,
        _completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.entry(user.clone()).or_default().insert(challenge_id);
        Ok(())
    }

    async fn completed_challenges(
        &self,
        user: &UserId,
    ) -> Result<HashSet<ChallengeId>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(user).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl LessonAnalyticsRepository for InMemoryRepository {
    async fn insert_analytics(&self, record: &LessonAnalyticsRecord) -> Result<i64, StorageError> {
        let mut guard = self.analytics.lock().map_err(poisoned)?;
        guard.push(record.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Conflict)
    }

    async fn list_analytics(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<LessonAnalyticsRecord>, StorageError> {
        let guard = self.analytics.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .iter()
            .rev()
            .filter(|r| &r.user_id == user)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Aggregates lesson, progress and analytics repositories behind trait objects
/// for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub analytics: Arc<dyn LessonAnalyticsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let lessons: Arc<dyn LessonRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let analytics: Arc<dyn LessonAnalyticsRepository> = Arc::new(repo);
        Self {
            lessons,
            progress,
            analytics,
        }
    }
}
