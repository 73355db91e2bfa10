use std::future::Future;
use std::sync::Arc;

use lesson_core::model::{ChallengeId, ChallengeKind, LessonId, OptionId, SignVerdict, UserId};
use lesson_core::{
    AttemptStatus, Clock, ConfirmStep, FiredAction, LessonSession, PersistApplied, SignStep,
    VideoStep,
};
use storage::repository::{LessonRepository, ProgressRepository};

use super::run::LessonRun;
use crate::capture::{CameraGuard, CaptureDevice, MAX_RECORDING, VideoClip};
use crate::classifier::SignClassifier;
use crate::error::{CaptureError, SessionError};
use crate::feedback::{CLIENT_FALLBACK_FEEDBACK, FeedbackService};

/// Result of confirming a choice challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Ignored,
    Wrong,
    RetryRecorded,
    /// Progress stored; the next confirm moves on.
    Correct,
    Advanced,
}

/// Result of the continue action on a teach-only challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    Ignored,
    TooEarly { remaining: chrono::Duration },
    Advanced,
}

/// Result of submitting a recorded sign.
#[derive(Debug, Clone, PartialEq)]
pub enum SignOutcome {
    Ignored,
    TryAgain {
        verdict: SignVerdict,
        retries: u32,
    },
    Accepted {
        verdict: SignVerdict,
        advance_at: chrono::DateTime<chrono::Utc>,
    },
}

/// Drives `LessonRun`s: loads lessons, stores progress before applying it,
/// keeps the camera in step with the current challenge, and starts feedback
/// generation when a lesson is completed.
#[derive(Clone)]
pub struct LessonLoopService {
    clock: Clock,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
    feedback: Arc<FeedbackService>,
    classifier: Option<Arc<dyn SignClassifier>>,
    camera: Option<Arc<dyn CaptureDevice>>,
}

impl LessonLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
        feedback: Arc<FeedbackService>,
    ) -> Self {
        Self {
            clock,
            lessons,
            progress,
            feedback,
            classifier: None,
            camera: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn SignClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Arc<dyn CaptureDevice>) -> Self {
        self.camera = Some(camera);
        self
    }

    // ─── Lifecycle ────────────────────────────────────────────────────────────

    /// Start a run for `user`, resuming at the first incomplete challenge.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for a lesson without challenges, or
    /// `SessionError::Storage` if the lesson cannot be loaded.
    pub async fn start_lesson(
        &self,
        user: UserId,
        lesson_id: LessonId,
    ) -> Result<LessonRun, SessionError> {
        let lesson = self.lessons.load_lesson(&user, lesson_id).await?;
        let session = LessonSession::new(lesson.challenges, lesson.percentage, self.clock.now())?;
        tracing::info!(
            %lesson_id,
            user_id = %user,
            start_index = session.active_index(),
            practice = session.is_practice_pass(),
            "lesson started"
        );

        let mut run = LessonRun::new(user, lesson_id, lesson.title, session);
        self.sync_camera(&mut run).await;
        Ok(run)
    }

    /// Time until the next scheduled action is due, if any.
    #[must_use]
    pub fn next_wakeup(&self, run: &LessonRun) -> Option<std::time::Duration> {
        run.session.next_due().map(|due| self.clock.until(due))
    }

    /// Fire due scheduled actions, then follow up on any advance.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` if the lesson summary cannot be built.
    pub async fn tick(&self, run: &mut LessonRun) -> Result<Vec<FiredAction>, SessionError> {
        let fired = run.session.tick(self.clock.now());
        if fired
            .iter()
            .any(|action| matches!(action, FiredAction::Advanced { .. }))
        {
            self.after_move(run).await?;
        }
        if fired.contains(&FiredAction::Exited) {
            tracing::info!(lesson_id = %run.lesson_id, "lesson exited");
        }
        Ok(fired)
    }

    /// Debug-only jump through the lesson. Not scored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` if the lesson summary cannot be built.
    pub async fn debug_seek(&self, run: &mut LessonRun, delta: isize) -> Result<(), SessionError> {
        run.session.debug_seek(delta, self.clock.now());
        self.after_move(run).await
    }

    // ─── Choice challenges ────────────────────────────────────────────────────

    pub fn select(&self, run: &mut LessonRun, option: OptionId) -> bool {
        run.session.select(option)
    }

    /// Confirm the current choice.
    ///
    /// A correct answer is stored before the session marks it correct; if the
    /// write fails the session is left as it was and can be confirmed again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when progress cannot be stored.
    pub async fn confirm(&self, run: &mut LessonRun) -> Result<ConfirmOutcome, SessionError> {
        let outcome = match run.session.confirm(self.clock.now()) {
            ConfirmStep::Ignored => ConfirmOutcome::Ignored,
            ConfirmStep::Wrong => ConfirmOutcome::Wrong,
            ConfirmStep::RetryRecorded => ConfirmOutcome::RetryRecorded,
            ConfirmStep::Advanced => {
                self.after_move(run).await?;
                ConfirmOutcome::Advanced
            }
            ConfirmStep::PersistRequired(challenge_id) => {
                match self.persist_and_apply(run, challenge_id).await? {
                    PersistApplied::Advanced => {
                        self.after_move(run).await?;
                        ConfirmOutcome::Advanced
                    }
                    PersistApplied::MarkedCorrect | PersistApplied::AdvanceScheduled { .. } => {
                        ConfirmOutcome::Correct
                    }
                }
            }
        };
        Ok(outcome)
    }

    // ─── Teach-only challenges ────────────────────────────────────────────────

    /// Continue past a `VIDEO_LEARN` challenge once its dwell time has passed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when progress cannot be stored.
    pub async fn continue_video(&self, run: &mut LessonRun) -> Result<VideoOutcome, SessionError> {
        match run.session.continue_video(self.clock.now()) {
            VideoStep::Ignored => Ok(VideoOutcome::Ignored),
            VideoStep::TooEarly { remaining } => Ok(VideoOutcome::TooEarly { remaining }),
            VideoStep::PersistRequired(challenge_id) => {
                self.persist_and_apply(run, challenge_id).await?;
                self.after_move(run).await?;
                Ok(VideoOutcome::Advanced)
            }
        }
    }

    // ─── Sign challenges ──────────────────────────────────────────────────────

    /// Record with the held camera until `stop` resolves or the recording cap
    /// is reached, then submit the clip.
    ///
    /// Nothing is recorded while an accepted sign waits for its advance.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotSignChallenge` off a sign challenge,
    /// `SessionError::Capture` if no camera is held or recording fails, and the
    /// errors of `submit_sign`.
    pub async fn record_and_submit<F>(
        &self,
        run: &mut LessonRun,
        stop: F,
    ) -> Result<SignOutcome, SessionError>
    where
        F: Future<Output = ()> + Send,
    {
        self.current_sign(run)?;
        if run.session.status() == AttemptStatus::Correct {
            return Ok(SignOutcome::Ignored);
        }
        let guard = run.camera.as_mut().ok_or(CaptureError::Released)?;
        let clip = guard.record_clip(stop, MAX_RECORDING).await?;
        self.submit_sign(run, &clip).await
    }

    /// Classify `clip` against the current sign challenge.
    ///
    /// A classifier failure counts no retry; the learner simply tries again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Classifier` when classification fails and
    /// `SessionError::Storage` when an accepted sign cannot be stored.
    pub async fn submit_sign(
        &self,
        run: &mut LessonRun,
        clip: &VideoClip,
    ) -> Result<SignOutcome, SessionError> {
        let (challenge_id, target) = self.current_sign(run)?;
        if run.session.status() == AttemptStatus::Correct {
            return Ok(SignOutcome::Ignored);
        }
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(SessionError::ClassifierUnavailable)?;

        let verdict = classifier
            .classify(clip, &target, challenge_id)
            .await
            .inspect_err(|err| {
                tracing::warn!(%challenge_id, error = %err, "sign classification failed");
            })?;
        tracing::debug!(
            %challenge_id,
            is_correct = verdict.is_correct,
            confidence = verdict.confidence,
            "sign classified"
        );

        match run.session.submit_verdict(&verdict) {
            SignStep::Ignored => Ok(SignOutcome::Ignored),
            SignStep::TryAgain { retries } => Ok(SignOutcome::TryAgain { verdict, retries }),
            SignStep::PersistRequired(challenge_id) => {
                match self.persist_and_apply(run, challenge_id).await? {
                    PersistApplied::AdvanceScheduled { at } => Ok(SignOutcome::Accepted {
                        verdict,
                        advance_at: at,
                    }),
                    PersistApplied::Advanced | PersistApplied::MarkedCorrect => {
                        self.after_move(run).await?;
                        Ok(SignOutcome::Accepted {
                            verdict,
                            advance_at: self.clock.now(),
                        })
                    }
                }
            }
        }
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    fn current_sign(&self, run: &LessonRun) -> Result<(ChallengeId, String), SessionError> {
        let challenge = run.session.current().ok_or(SessionError::Completed)?;
        if challenge.kind() != ChallengeKind::SignDetect {
            return Err(SessionError::NotSignChallenge);
        }
        Ok((challenge.id(), challenge.target_sign().to_string()))
    }

    async fn persist_and_apply(
        &self,
        run: &mut LessonRun,
        challenge_id: ChallengeId,
    ) -> Result<PersistApplied, SessionError> {
        self.progress
            .upsert_challenge_progress(&run.user, challenge_id, self.clock.now())
            .await
            .inspect_err(|err| {
                tracing::warn!(%challenge_id, error = %err, "failed to store challenge progress");
            })?;
        let applied = run.session.apply_persisted(challenge_id, self.clock.now())?;
        tracing::debug!(
            %challenge_id,
            percentage = run.session.percentage(),
            "challenge passed"
        );
        Ok(applied)
    }

    async fn after_move(&self, run: &mut LessonRun) -> Result<(), SessionError> {
        self.sync_camera(run).await;
        self.maybe_finalize(run)
    }

    /// Hold a camera exactly while a `SIGN_DETECT` challenge is current.
    async fn sync_camera(&self, run: &mut LessonRun) {
        let wanted = run
            .session
            .current()
            .filter(|c| c.kind() == ChallengeKind::SignDetect)
            .map(|c| c.id());

        let held = run.camera.as_ref().map(CameraGuard::challenge_id);
        if held == wanted && run.camera_active() {
            return;
        }
        run.release_camera();
        run.camera_error = None;

        let (Some(challenge_id), Some(device)) = (wanted, self.camera.as_ref()) else {
            return;
        };
        match CameraGuard::acquire(device.as_ref(), challenge_id).await {
            Ok(guard) => run.camera = Some(guard),
            Err(err) => {
                tracing::warn!(%challenge_id, error = %err, "camera unavailable");
                run.camera_error = Some(err);
            }
        }
    }

    fn maybe_finalize(&self, run: &mut LessonRun) -> Result<(), SessionError> {
        let Some(summary) = run.session.finalize(self.clock.now())? else {
            return Ok(());
        };
        run.release_camera();
        tracing::info!(
            lesson_id = %run.lesson_id,
            total_challenges = summary.total_challenges,
            correct_first_try = summary.correct_first_try,
            total_retries = summary.total_retries,
            "lesson completed"
        );

        let feedback = Arc::clone(&self.feedback);
        let user = run.user.clone();
        let lesson_id = run.lesson_id;
        run.feedback_task = Some(tokio::spawn(async move {
            match feedback.generate_for_user(&user, lesson_id, &summary).await {
                Ok(generated) => generated.text,
                Err(err) => {
                    tracing::warn!(%lesson_id, error = %err, "feedback generation failed");
                    CLIENT_FALLBACK_FEEDBACK.to_string()
                }
            }
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fake::FakeCamera;
    use crate::error::ClassifierError;
    use crate::identity::StaticTokenIdentity;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use lesson_core::model::{Challenge, ChallengeOption};
    use lesson_core::time::fixed_now;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use storage::repository::{
        InMemoryRepository, LessonAnalyticsRepository, LessonRecord, StorageError,
    };

    /// Progress store that fails while `failing` is set.
    #[derive(Default)]
    struct FlakyProgress {
        failing: Mutex<bool>,
        stored: Mutex<Vec<(ChallengeId, DateTime<Utc>)>>,
    }

    impl FlakyProgress {
        fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }
    }

    #[async_trait]
    impl ProgressRepository for FlakyProgress {
        async fn upsert_challenge_progress(
            &self,
            _user: &UserId,
            challenge_id: ChallengeId,
            completed_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            if *self.failing.lock().unwrap() {
                return Err(StorageError::Connection("offline".into()));
            }
            self.stored.lock().unwrap().push((challenge_id, completed_at));
            Ok(())
        }

        async fn completed_challenges(
            &self,
            _user: &UserId,
        ) -> Result<HashSet<ChallengeId>, StorageError> {
            Ok(self.stored.lock().unwrap().iter().map(|(id, _)| *id).collect())
        }
    }

    /// Classifier answering from a fixed script, then failing.
    struct ScriptedClassifier {
        verdicts: Mutex<Vec<SignVerdict>>,
        targets: Mutex<Vec<String>>,
    }

    impl ScriptedClassifier {
        fn new(mut verdicts: Vec<SignVerdict>) -> Self {
            verdicts.reverse();
            Self {
                verdicts: Mutex::new(verdicts),
                targets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SignClassifier for ScriptedClassifier {
        async fn classify(
            &self,
            _clip: &VideoClip,
            target_sign: &str,
            _challenge_id: ChallengeId,
        ) -> Result<SignVerdict, ClassifierError> {
            self.targets.lock().unwrap().push(target_sign.to_string());
            self.verdicts
                .lock()
                .unwrap()
                .pop()
                .ok_or(ClassifierError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    fn choice(id: u64, order: u32) -> Challenge {
        Challenge::new(
            ChallengeId::new(id),
            ChallengeKind::StandardChoice,
            order,
            "Which sign is this?",
            None,
            vec![
                ChallengeOption::new(OptionId::new(id * 10 + 1), "hello", true),
                ChallengeOption::new(OptionId::new(id * 10 + 2), "goodbye", false),
            ],
        )
        .unwrap()
    }

    fn sign(id: u64, order: u32) -> Challenge {
        Challenge::new(
            ChallengeId::new(id),
            ChallengeKind::SignDetect,
            order,
            "Perform the sign: \"thank you\"",
            None,
            Vec::new(),
        )
        .unwrap()
    }

    fn learn(id: u64, order: u32) -> Challenge {
        Challenge::new(
            ChallengeId::new(id),
            ChallengeKind::VideoLearn,
            order,
            "thank you",
            Some("https://player.example/thanks".into()),
            Vec::new(),
        )
        .unwrap()
    }

    struct Harness {
        repo: InMemoryRepository,
        progress: Arc<FlakyProgress>,
        camera: FakeCamera,
        service: LessonLoopService,
    }

    async fn harness(challenges: Vec<Challenge>) -> Harness {
        let repo = InMemoryRepository::new();
        repo.insert_lesson(&LessonRecord {
            id: LessonId::new(1),
            title: "Greetings".into(),
            challenges,
        })
        .await
        .unwrap();
        let progress = Arc::new(FlakyProgress::default());
        let feedback = Arc::new(FeedbackService::new(
            Clock::fixed(fixed_now()),
            Arc::new(StaticTokenIdentity::new()),
            Arc::new(repo.clone()),
        ));
        let camera = FakeCamera::default();
        let service = LessonLoopService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::clone(&progress) as Arc<dyn ProgressRepository>,
            feedback,
        )
        .with_camera(Arc::new(camera.clone()));
        Harness {
            repo,
            progress,
            camera,
            service,
        }
    }

    fn user() -> UserId {
        UserId::new("learner")
    }

    #[tokio::test]
    async fn progress_failure_leaves_state_untouched() {
        let h = harness(vec![choice(1, 1), choice(2, 2)]).await;
        let mut run = h.service.start_lesson(user(), LessonId::new(1)).await.unwrap();

        assert!(h.service.select(&mut run, OptionId::new(11)));
        h.progress.set_failing(true);
        let err = h.service.confirm(&mut run).await.unwrap_err();
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert_eq!(run.session().status(), AttemptStatus::None);
        assert!(run.session().percentage().abs() < f64::EPSILON);

        h.progress.set_failing(false);
        assert_eq!(h.service.confirm(&mut run).await.unwrap(), ConfirmOutcome::Correct);
        assert!((run.session().percentage() - 50.0).abs() < f64::EPSILON);
        assert_eq!(
            *h.progress.stored.lock().unwrap(),
            vec![(ChallengeId::new(1), fixed_now())]
        );
        assert_eq!(h.service.confirm(&mut run).await.unwrap(), ConfirmOutcome::Advanced);
        assert_eq!(run.session().active_index(), 1);
    }

    #[tokio::test]
    async fn camera_follows_sign_challenges_and_is_released_once() {
        let h = harness(vec![choice(1, 1), sign(2, 2), choice(3, 3)]).await;
        let mut run = h.service.start_lesson(user(), LessonId::new(1)).await.unwrap();
        assert!(!run.camera_active());

        h.service.select(&mut run, OptionId::new(11));
        h.service.confirm(&mut run).await.unwrap();
        h.service.confirm(&mut run).await.unwrap();
        assert!(run.camera_active());
        assert_eq!(h.camera.opens(), 1);

        h.service.debug_seek(&mut run, 1).await.unwrap();
        assert!(!run.camera_active());
        assert_eq!(h.camera.releases(), 1);

        h.service.debug_seek(&mut run, -1).await.unwrap();
        assert!(run.camera_active());
        drop(run);
        assert_eq!(h.camera.opens(), 2);
        assert_eq!(h.camera.releases(), 2);
    }

    #[tokio::test]
    async fn camera_errors_are_reported_on_the_run() {
        let mut h = harness(vec![sign(1, 1)]).await;
        let denied = FakeCamera {
            fail_with: Some(CaptureError::NotFound),
            ..FakeCamera::default()
        };
        h.service = h.service.clone().with_camera(Arc::new(denied));

        let run = h.service.start_lesson(user(), LessonId::new(1)).await.unwrap();
        assert!(!run.camera_active());
        assert_eq!(run.camera_error(), Some(&CaptureError::NotFound));
    }

    #[tokio::test]
    async fn sign_flow_retries_then_advances_after_delay() {
        let h = harness(vec![sign(1, 1), choice(2, 2)]).await;
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            SignVerdict::new(false, 20.0, Some("please".into())),
            SignVerdict::new(false, 35.0, None),
            SignVerdict::new(true, 88.0, Some("thank you".into())),
        ]));
        let service = h
            .service
            .clone()
            .with_classifier(Arc::clone(&classifier) as Arc<dyn SignClassifier>);
        let mut run = service.start_lesson(user(), LessonId::new(1)).await.unwrap();

        for expected in 1..=2 {
            let outcome = service
                .record_and_submit(&mut run, async {})
                .await
                .unwrap();
            assert!(matches!(outcome, SignOutcome::TryAgain { retries, .. } if retries == expected));
        }

        let outcome = service.record_and_submit(&mut run, async {}).await.unwrap();
        let advance_at = match outcome {
            SignOutcome::Accepted { advance_at, .. } => advance_at,
            other => panic!("expected acceptance, got {other:?}"),
        };
        assert_eq!(advance_at, fixed_now() + Duration::seconds(1));
        assert_eq!(run.session().active_index(), 0);
        assert_eq!(classifier.targets.lock().unwrap()[0], "thank you");

        let later = service.clone().with_clock(Clock::fixed(advance_at));
        let fired = later.tick(&mut run).await.unwrap();
        assert_eq!(
            fired,
            vec![FiredAction::Advanced {
                from: ChallengeId::new(1)
            }]
        );
        assert_eq!(run.session().active_index(), 1);
        assert!(!run.camera_active());
        assert_eq!(h.camera.releases(), 1);
        assert_eq!(run.session().metrics()[0].retry_count, 2);
    }

    #[tokio::test]
    async fn pending_sign_advance_skips_recording_and_classifier() {
        let h = harness(vec![sign(1, 1), choice(2, 2)]).await;
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            SignVerdict::new(true, 91.0, Some("thank you".into())),
            SignVerdict::new(false, 10.0, None),
        ]));
        let service = h
            .service
            .clone()
            .with_classifier(Arc::clone(&classifier) as Arc<dyn SignClassifier>);
        let mut run = service.start_lesson(user(), LessonId::new(1)).await.unwrap();

        let outcome = service.record_and_submit(&mut run, async {}).await.unwrap();
        assert!(matches!(outcome, SignOutcome::Accepted { .. }));
        assert_eq!(run.session().status(), AttemptStatus::Correct);

        let again = service.record_and_submit(&mut run, async {}).await.unwrap();
        assert!(matches!(again, SignOutcome::Ignored));
        let direct = service
            .submit_sign(&mut run, &VideoClip::webm(vec![1]))
            .await
            .unwrap();
        assert!(matches!(direct, SignOutcome::Ignored));

        assert_eq!(h.camera.recordings(), 1);
        assert_eq!(classifier.targets.lock().unwrap().len(), 1);
        assert_eq!(run.session().metrics()[0].retry_count, 0);
        assert!(run.camera_active());
    }

    #[tokio::test]
    async fn classifier_failure_counts_no_retry() {
        let h = harness(vec![sign(1, 1)]).await;
        let service = h
            .service
            .clone()
            .with_classifier(Arc::new(ScriptedClassifier::new(Vec::new())));
        let mut run = service.start_lesson(user(), LessonId::new(1)).await.unwrap();

        let err = service
            .submit_sign(&mut run, &VideoClip::webm(vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Classifier(_)));
        assert_eq!(run.session().metrics()[0].retry_count, 0);
    }

    #[tokio::test]
    async fn submitting_off_a_sign_challenge_is_rejected() {
        let h = harness(vec![choice(1, 1)]).await;
        let mut run = h.service.start_lesson(user(), LessonId::new(1)).await.unwrap();
        let err = h
            .service
            .submit_sign(&mut run, &VideoClip::webm(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotSignChallenge));
    }

    #[tokio::test]
    async fn video_dwell_then_completion_spawns_feedback_and_exit() {
        let h = harness(vec![learn(1, 1)]).await;
        let mut run = h.service.start_lesson(user(), LessonId::new(1)).await.unwrap();

        let early = h.service.continue_video(&mut run).await.unwrap();
        assert_eq!(
            early,
            VideoOutcome::TooEarly {
                remaining: Duration::seconds(3)
            }
        );

        let done_at = fixed_now() + Duration::seconds(3);
        let later = h.service.clone().with_clock(Clock::fixed(done_at));
        assert_eq!(later.continue_video(&mut run).await.unwrap(), VideoOutcome::Advanced);
        assert!(run.session().is_finalized());
        assert!(run.feedback_pending());

        let exit_at = done_at + Duration::seconds(3);
        assert_eq!(later.next_wakeup(&run), Some(std::time::Duration::from_secs(3)));
        let exited = h.service.clone().with_clock(Clock::fixed(exit_at));
        assert_eq!(exited.tick(&mut run).await.unwrap(), vec![FiredAction::Exited]);
        assert!(run.session().has_exited());

        let text = run.await_feedback().await.unwrap().to_string();
        assert!(text.starts_with("Lesson Summary"));
        let stored = h.repo.list_analytics(&user(), 5).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].points_earned, 10);
        assert_eq!(stored[0].ai_feedback, text);
    }

    #[tokio::test]
    async fn completed_lesson_restarts_as_practice() {
        let h = harness(vec![choice(1, 1), choice(2, 2)]).await;
        h.repo
            .upsert_challenge_progress(&user(), ChallengeId::new(1), fixed_now())
            .await
            .unwrap();
        h.repo
            .upsert_challenge_progress(&user(), ChallengeId::new(2), fixed_now())
            .await
            .unwrap();

        let run = h.service.start_lesson(user(), LessonId::new(1)).await.unwrap();
        assert!(run.session().is_practice_pass());
        assert_eq!(run.session().active_index(), 0);
        assert!(run.session().percentage().abs() < f64::EPSILON);
    }
}
