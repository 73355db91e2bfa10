use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::challenge::ChallengeKind;
use crate::model::metric::ChallengeMetric;

/// Points granted per challenge in a finished lesson.
pub const POINTS_PER_CHALLENGE: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("summary has no challenges")]
    NoChallenges,

    #[error("too many challenges for a single lesson: {len}")]
    TooManyChallenges { len: usize },

    #[error("correct first try ({correct}) exceeds total challenges ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("challenge details ({details}) exceed total challenges ({total})")]
    DetailsExceedTotal { details: usize, total: u32 },

    #[error("completed_at is before started_at")]
    InvalidTimeRange,
}

/// Per-challenge line of a performance summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDetail {
    #[serde(rename = "type")]
    pub kind: ChallengeKind,
    pub retries: u32,
    pub time_spent: u64,
}

/// Aggregated session metrics handed to feedback generation.
///
/// Serialized in camelCase, which is also the shape accepted by the feedback
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPerformanceSummary {
    pub total_challenges: u32,
    pub correct_first_try: u32,
    pub total_retries: u32,
    pub total_time_seconds: u64,
    pub points_earned: u32,
    pub challenge_details: Vec<ChallengeDetail>,
}

impl LessonPerformanceSummary {
    /// Build a summary from the recorder snapshot at the end of a session.
    ///
    /// `total_challenges` is the lesson length. Only tracked challenges contribute
    /// to `correct_first_try`, `total_retries` and `challenge_details`.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::InvalidTimeRange` if `completed_at` is before
    /// `started_at`, `SummaryError::NoChallenges` for an empty lesson, and
    /// `SummaryError::TooManyChallenges` if the length does not fit in `u32`.
    pub fn from_metrics(
        total_challenges: usize,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        metrics: &[ChallengeMetric],
    ) -> Result<Self, SummaryError> {
        if completed_at < started_at {
            return Err(SummaryError::InvalidTimeRange);
        }
        let total = u32::try_from(total_challenges).map_err(|_| SummaryError::TooManyChallenges {
            len: total_challenges,
        })?;
        if total == 0 {
            return Err(SummaryError::NoChallenges);
        }

        let mut correct_first_try = 0_u32;
        let mut total_retries = 0_u32;
        let mut challenge_details = Vec::with_capacity(metrics.len());
        for metric in metrics {
            if metric.retry_count == 0 {
                correct_first_try = correct_first_try.saturating_add(1);
            }
            total_retries = total_retries.saturating_add(metric.retry_count);
            challenge_details.push(ChallengeDetail {
                kind: metric.kind,
                retries: metric.retry_count,
                time_spent: metric.time_spent_secs(completed_at),
            });
        }

        let total_time_seconds = u64::try_from((completed_at - started_at).num_seconds()).unwrap_or(0);

        let summary = Self {
            total_challenges: total,
            correct_first_try,
            total_retries,
            total_time_seconds,
            points_earned: total.saturating_mul(POINTS_PER_CHALLENGE),
            challenge_details,
        };
        summary.validate()?;
        Ok(summary)
    }

    /// Check the internal consistency of a summary received from a caller.
    ///
    /// # Errors
    ///
    /// Returns the first `SummaryError` found.
    pub fn validate(&self) -> Result<(), SummaryError> {
        if self.total_challenges == 0 {
            return Err(SummaryError::NoChallenges);
        }
        if self.correct_first_try > self.total_challenges {
            return Err(SummaryError::CorrectExceedsTotal {
                correct: self.correct_first_try,
                total: self.total_challenges,
            });
        }
        let details = self.challenge_details.len();
        if u32::try_from(details).map_or(true, |d| d > self.total_challenges) {
            return Err(SummaryError::DetailsExceedTotal {
                details,
                total: self.total_challenges,
            });
        }
        Ok(())
    }

    /// Derived rates used by feedback generation.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::NoChallenges` when `total_challenges` is zero.
    pub fn rates(&self) -> Result<FeedbackRates, SummaryError> {
        if self.total_challenges == 0 {
            return Err(SummaryError::NoChallenges);
        }
        let total = f64::from(self.total_challenges);
        #[allow(clippy::cast_precision_loss)]
        let total_time = self.total_time_seconds as f64;
        Ok(FeedbackRates {
            accuracy_rate: f64::from(self.correct_first_try) / total * 100.0,
            retry_rate: f64::from(self.total_retries) / total,
            avg_time_per_challenge: total_time / total,
        })
    }
}

/// Rates derived from a summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackRates {
    /// Percentage of challenges passed on the first attempt (0-100).
    pub accuracy_rate: f64,
    /// Mean retries per challenge.
    pub retry_rate: f64,
    /// Mean seconds per challenge.
    pub avg_time_per_challenge: f64,
}
