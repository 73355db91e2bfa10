//! Lesson session state machine.
//!
//! `LessonSession` owns the sequencer, the metrics recorder and the transient
//! per-attempt state. Every transition is a plain method taking `now`, so the
//! rendering layer and the services layer only drive it.
//!
//! Progress persistence is split in two phases: a transition that needs the
//! store returns `PersistRequired`, and the caller applies the result with
//! `apply_persisted` once the write succeeded. A failed write leaves the session
//! untouched.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{
    Challenge, ChallengeId, ChallengeKind, ChallengeMetric, LessonPerformanceSummary,
    MetricsRecorder, OptionId, SignVerdict, SummaryError,
};
use crate::sequencer::ChallengeSequencer;

/// Minimum time a `VIDEO_LEARN` challenge stays on screen before it can be continued.
pub const VIDEO_LEARN_MIN_DWELL_SECS: i64 = 3;
/// Delay between an accepted sign verdict and the advance.
pub const SIGN_DETECT_ADVANCE_DELAY_MS: i64 = 1_000;
/// Delay between lesson completion and the exit transition.
pub const LESSON_EXIT_DELAY_SECS: i64 = 3;

const FULL_PROGRESS: f64 = 100.0;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("lesson has no challenges")]
    Empty,

    #[error("no progress write is pending for challenge {0}")]
    NotAwaitingPersist(ChallengeId),

    #[error("challenge {expected} is no longer current")]
    StaleChallenge { expected: ChallengeId },

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

//
// ─── STEP TYPES ───────────────────────────────────────────────────────────────
//

/// Transient per-attempt state of the current challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptStatus {
    #[default]
    None,
    Wrong,
    Correct,
}

/// Result of the confirm action on a choice challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmStep {
    /// Nothing to confirm (no selection, not a choice challenge, or lesson over).
    Ignored,
    /// The selection did not match the correct option.
    Wrong,
    /// A retry was counted and the challenge is open again.
    RetryRecorded,
    /// The sequencer moved on.
    Advanced,
    /// The selection is correct; progress must be stored before applying it.
    PersistRequired(ChallengeId),
}

/// Result of the continue action on a `VIDEO_LEARN` challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStep {
    Ignored,
    TooEarly { remaining: Duration },
    PersistRequired(ChallengeId),
}

/// Result of feeding a classifier verdict to a `SIGN_DETECT` challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignStep {
    Ignored,
    TryAgain { retries: u32 },
    PersistRequired(ChallengeId),
}

/// What `apply_persisted` did once the store confirmed the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistApplied {
    /// Choice challenge is now `Correct`; the next confirm advances.
    MarkedCorrect,
    /// Teach-only challenge finished and the sequencer moved on.
    Advanced,
    /// Sign accepted; the advance fires at `at`.
    AdvanceScheduled { at: DateTime<Utc> },
}

/// A delayed action owned by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Leave challenge `from`. Dropped if `from` stops being current first.
    Advance { from: ChallengeId },
    /// Leave the lesson.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAction {
    pub action: ScheduledAction,
    pub due_at: DateTime<Utc>,
}

/// An action fired by `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiredAction {
    Advanced { from: ChallengeId },
    Exited,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one lesson run.
#[derive(Debug, Clone)]
pub struct LessonSession {
    sequencer: ChallengeSequencer,
    metrics: MetricsRecorder,
    status: AttemptStatus,
    selected: Option<OptionId>,
    percentage: f64,
    started_at: DateTime<Utc>,
    entered_at: DateTime<Utc>,
    awaiting_persist: Option<ChallengeId>,
    pending: Vec<PendingAction>,
    summary: Option<LessonPerformanceSummary>,
    exited: bool,
}

impl LessonSession {
    /// Start a session over `challenges`.
    ///
    /// `initial_percentage` is the stored progress for the lesson. A lesson that
    /// is already complete restarts from 0 as a practice pass.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Empty` if no challenges are provided.
    pub fn new(
        challenges: Vec<Challenge>,
        initial_percentage: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        if challenges.is_empty() {
            return Err(SessionStateError::Empty);
        }
        let sequencer = ChallengeSequencer::new(challenges);
        let percentage = if sequencer.is_practice_pass() || initial_percentage >= FULL_PROGRESS {
            0.0
        } else if initial_percentage.is_finite() {
            initial_percentage.max(0.0)
        } else {
            0.0
        };

        let mut session = Self {
            sequencer,
            metrics: MetricsRecorder::new(),
            status: AttemptStatus::None,
            selected: None,
            percentage,
            started_at: now,
            entered_at: now,
            awaiting_persist: None,
            pending: Vec::new(),
            summary: None,
            exited: false,
        };
        session.enter_current(now);
        Ok(session)
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn current(&self) -> Option<&Challenge> {
        self.sequencer.current()
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.sequencer.active_index()
    }

    #[must_use]
    pub fn total_challenges(&self) -> usize {
        self.sequencer.len()
    }

    #[must_use]
    pub fn challenges(&self) -> &[Challenge] {
        self.sequencer.challenges()
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    #[must_use]
    pub fn selected_option(&self) -> Option<OptionId> {
        self.selected
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// True when the lesson was already complete and this run is practice.
    ///
    /// The UI uses this to show the "practice available" notice.
    #[must_use]
    pub fn is_practice_pass(&self) -> bool {
        self.sequencer.is_practice_pass()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn challenge_entered_at(&self) -> DateTime<Utc> {
        self.entered_at
    }

    #[must_use]
    pub fn metrics(&self) -> &[ChallengeMetric] {
        self.metrics.snapshot()
    }

    #[must_use]
    pub fn awaiting_persist(&self) -> Option<ChallengeId> {
        self.awaiting_persist
    }

    #[must_use]
    pub fn pending_actions(&self) -> &[PendingAction] {
        &self.pending
    }

    /// Earliest due time among pending actions.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.iter().map(|p| p.due_at).min()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.sequencer.is_exhausted()
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.summary.is_some()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&LessonPerformanceSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    // ─── Choice flow ──────────────────────────────────────────────────────────

    /// Pick a candidate answer.
    ///
    /// Accepted only while the status is `None`, on a choice challenge, for one
    /// of its own options. Returns whether the selection was taken.
    pub fn select(&mut self, option: OptionId) -> bool {
        if self.status != AttemptStatus::None {
            return false;
        }
        let Some(challenge) = self.sequencer.current() else {
            return false;
        };
        if !challenge.kind().is_choice() || !challenge.has_option(option) {
            return false;
        }
        self.selected = Some(option);
        true
    }

    /// Confirm the current choice challenge.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> ConfirmStep {
        let Some(challenge) = self.sequencer.current() else {
            return ConfirmStep::Ignored;
        };
        if !challenge.kind().is_choice() {
            return ConfirmStep::Ignored;
        }
        let challenge_id = challenge.id();

        match self.status {
            AttemptStatus::Wrong => {
                self.metrics.record_retry(challenge_id);
                self.status = AttemptStatus::None;
                self.selected = None;
                ConfirmStep::RetryRecorded
            }
            AttemptStatus::Correct => {
                self.advance(now);
                ConfirmStep::Advanced
            }
            AttemptStatus::None => {
                let Some(selected) = self.selected else {
                    return ConfirmStep::Ignored;
                };
                let is_correct = challenge
                    .correct_option()
                    .is_some_and(|option| option.id == selected);
                if is_correct {
                    self.awaiting_persist = Some(challenge_id);
                    ConfirmStep::PersistRequired(challenge_id)
                } else {
                    self.status = AttemptStatus::Wrong;
                    ConfirmStep::Wrong
                }
            }
        }
    }

    // ─── Teach-only flow ──────────────────────────────────────────────────────

    /// Continue past a `VIDEO_LEARN` challenge once the dwell time has passed.
    pub fn continue_video(&mut self, now: DateTime<Utc>) -> VideoStep {
        let Some(challenge) = self.sequencer.current() else {
            return VideoStep::Ignored;
        };
        if challenge.kind() != ChallengeKind::VideoLearn {
            return VideoStep::Ignored;
        }
        let unlock_at = self.entered_at + Duration::seconds(VIDEO_LEARN_MIN_DWELL_SECS);
        if now < unlock_at {
            return VideoStep::TooEarly {
                remaining: unlock_at - now,
            };
        }
        let challenge_id = challenge.id();
        self.awaiting_persist = Some(challenge_id);
        VideoStep::PersistRequired(challenge_id)
    }

    // ─── Sign flow ────────────────────────────────────────────────────────────

    /// Feed a classifier verdict to the current `SIGN_DETECT` challenge.
    ///
    /// A negative verdict counts a retry and keeps the challenge open; there is
    /// no limit on attempts.
    pub fn submit_verdict(&mut self, verdict: &SignVerdict) -> SignStep {
        let Some(challenge) = self.sequencer.current() else {
            return SignStep::Ignored;
        };
        if challenge.kind() != ChallengeKind::SignDetect || self.status == AttemptStatus::Correct {
            return SignStep::Ignored;
        }
        let challenge_id = challenge.id();

        if verdict.is_correct {
            self.awaiting_persist = Some(challenge_id);
            return SignStep::PersistRequired(challenge_id);
        }

        self.metrics.record_retry(challenge_id);
        let retries = self
            .metrics
            .get(challenge_id)
            .map_or(0, |metric| metric.retry_count);
        SignStep::TryAgain { retries }
    }

    // ─── Persistence confirmation ─────────────────────────────────────────────

    /// Apply a successful progress write for `challenge_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NotAwaitingPersist` if no write was requested
    /// for that challenge and `SessionStateError::StaleChallenge` if it is no
    /// longer current.
    pub fn apply_persisted(
        &mut self,
        challenge_id: ChallengeId,
        now: DateTime<Utc>,
    ) -> Result<PersistApplied, SessionStateError> {
        if self.awaiting_persist != Some(challenge_id) {
            return Err(SessionStateError::NotAwaitingPersist(challenge_id));
        }
        let kind = match self.sequencer.current() {
            Some(challenge) if challenge.id() == challenge_id => challenge.kind(),
            _ => {
                self.awaiting_persist = None;
                return Err(SessionStateError::StaleChallenge {
                    expected: challenge_id,
                });
            }
        };

        self.awaiting_persist = None;
        self.bump_percentage();

        let applied = match kind {
            ChallengeKind::VideoLearn => {
                self.advance(now);
                PersistApplied::Advanced
            }
            ChallengeKind::SignDetect => {
                self.status = AttemptStatus::Correct;
                let at = now + Duration::milliseconds(SIGN_DETECT_ADVANCE_DELAY_MS);
                self.schedule(ScheduledAction::Advance { from: challenge_id }, at);
                PersistApplied::AdvanceScheduled { at }
            }
            ChallengeKind::StandardChoice | ChallengeKind::Assist | ChallengeKind::VideoSelect => {
                self.status = AttemptStatus::Correct;
                PersistApplied::MarkedCorrect
            }
        };
        Ok(applied)
    }

    // ─── Timers ───────────────────────────────────────────────────────────────

    /// Fire every pending action due at or before `now`, earliest first.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<FiredAction> {
        let mut due: Vec<PendingAction> = Vec::new();
        self.pending.retain(|p| {
            if p.due_at <= now {
                due.push(*p);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|p| p.due_at);

        let mut fired = Vec::with_capacity(due.len());
        for pending in due {
            match pending.action {
                ScheduledAction::Advance { from } => {
                    if self.current().map(Challenge::id) == Some(from) {
                        self.advance(now);
                        fired.push(FiredAction::Advanced { from });
                    }
                }
                ScheduledAction::Exit => {
                    self.exited = true;
                    fired.push(FiredAction::Exited);
                }
            }
        }
        fired
    }

    // ─── Debug navigation ─────────────────────────────────────────────────────

    /// Jump by `delta` challenges, clamped to the list. Not part of the scored flow.
    pub fn debug_seek(&mut self, delta: isize, now: DateTime<Utc>) {
        self.sequencer.debug_seek(delta);
        self.enter_current(now);
    }

    // ─── Aggregation ──────────────────────────────────────────────────────────

    /// Build the performance summary once the lesson is exhausted.
    ///
    /// Returns `Ok(None)` while challenges remain or once the session was already
    /// finalized. On the first call it also schedules the exit transition.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Summary` if the summary cannot be built.
    pub fn finalize(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<LessonPerformanceSummary>, SessionStateError> {
        if !self.is_exhausted() || self.summary.is_some() {
            return Ok(None);
        }
        let summary = LessonPerformanceSummary::from_metrics(
            self.sequencer.len(),
            self.started_at,
            now.max(self.started_at),
            self.metrics.snapshot(),
        )?;
        self.summary = Some(summary.clone());
        self.schedule(
            ScheduledAction::Exit,
            now + Duration::seconds(LESSON_EXIT_DELAY_SECS),
        );
        Ok(Some(summary))
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    fn advance(&mut self, now: DateTime<Utc>) {
        self.sequencer.advance();
        self.enter_current(now);
    }

    /// Reset per-attempt state for whatever challenge is now current.
    fn enter_current(&mut self, now: DateTime<Utc>) {
        self.status = AttemptStatus::None;
        self.selected = None;
        self.awaiting_persist = None;
        self.entered_at = now;

        let current = self.sequencer.current().map(Challenge::id);
        self.pending.retain(|p| match p.action {
            ScheduledAction::Advance { from } => Some(from) == current,
            ScheduledAction::Exit => true,
        });

        if let Some(challenge) = self.sequencer.current() {
            self.metrics.ensure_tracked(challenge, now);
        }
    }

    fn bump_percentage(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let step = FULL_PROGRESS / self.sequencer.len() as f64;
        self.percentage = (self.percentage + step).min(FULL_PROGRESS);
    }

    fn schedule(&mut self, action: ScheduledAction, due_at: DateTime<Utc>) {
        self.pending.push(PendingAction { action, due_at });
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
