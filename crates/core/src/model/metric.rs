use chrono::{DateTime, Utc};

use crate::model::challenge::{Challenge, ChallengeKind};
use crate::model::ids::ChallengeId;

/// Timing and retry data for one challenge within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMetric {
    pub challenge_id: ChallengeId,
    pub kind: ChallengeKind,
    pub started_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl ChallengeMetric {
    #[must_use]
    pub fn new(challenge_id: ChallengeId, kind: ChallengeKind, started_at: DateTime<Utc>) -> Self {
        Self {
            challenge_id,
            kind,
            started_at,
            retry_count: 0,
        }
    }

    /// Whole seconds from first presentation to `until`, the summary time.
    /// Never negative.
    #[must_use]
    pub fn time_spent_secs(&self, until: DateTime<Utc>) -> u64 {
        u64::try_from((until - self.started_at).num_seconds()).unwrap_or(0)
    }
}

/// Accumulates one `ChallengeMetric` per challenge, in first-presentation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsRecorder {
    metrics: Vec<ChallengeMetric>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `challenge` if it is not tracked yet.
    ///
    /// Returns true when a new metric was created.
    pub fn ensure_tracked(&mut self, challenge: &Challenge, now: DateTime<Utc>) -> bool {
        if self.get(challenge.id()).is_some() {
            return false;
        }
        self.metrics
            .push(ChallengeMetric::new(challenge.id(), challenge.kind(), now));
        true
    }

    /// Count a wrong attempt. Untracked ids are ignored.
    pub fn record_retry(&mut self, challenge_id: ChallengeId) {
        if let Some(metric) = self.get_mut(challenge_id) {
            metric.retry_count = metric.retry_count.saturating_add(1);
        }
    }

    #[must_use]
    pub fn get(&self, challenge_id: ChallengeId) -> Option<&ChallengeMetric> {
        self.metrics.iter().find(|m| m.challenge_id == challenge_id)
    }

    fn get_mut(&mut self, challenge_id: ChallengeId) -> Option<&mut ChallengeMetric> {
        self.metrics
            .iter_mut()
            .find(|m| m.challenge_id == challenge_id)
    }

    #[must_use]
    pub fn snapshot(&self) -> &[ChallengeMetric] {
        &self.metrics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
