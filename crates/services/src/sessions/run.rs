use lesson_core::LessonSession;
use lesson_core::model::{LessonId, UserId};
use tokio::task::JoinHandle;

use crate::capture::CameraGuard;
use crate::error::CaptureError;
use crate::feedback::CLIENT_FALLBACK_FEEDBACK;

/// One learner's pass through a lesson: the pure session plus the live
/// resources around it.
///
/// Dropping the run releases the camera. A feedback task still in flight is
/// detached and finishes on its own.
#[derive(Debug)]
pub struct LessonRun {
    pub(crate) user: UserId,
    pub(crate) lesson_id: LessonId,
    pub(crate) title: String,
    pub(crate) session: LessonSession,
    pub(crate) camera: Option<CameraGuard>,
    pub(crate) camera_error: Option<CaptureError>,
    pub(crate) feedback_task: Option<JoinHandle<String>>,
    pub(crate) feedback: Option<String>,
}

impl LessonRun {
    pub(crate) fn new(user: UserId, lesson_id: LessonId, title: String, session: LessonSession) -> Self {
        Self {
            user,
            lesson_id,
            title,
            session,
            camera: None,
            camera_error: None,
            feedback_task: None,
            feedback: None,
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn session(&self) -> &LessonSession {
        &self.session
    }

    /// True while a camera stream is held for the current challenge.
    #[must_use]
    pub fn camera_active(&self) -> bool {
        self.camera.as_ref().is_some_and(|guard| !guard.is_released())
    }

    /// Last failure to open the camera for the current challenge.
    #[must_use]
    pub fn camera_error(&self) -> Option<&CaptureError> {
        self.camera_error.as_ref()
    }

    #[must_use]
    pub fn feedback_pending(&self) -> bool {
        self.feedback_task.is_some()
    }

    /// Feedback text once `await_feedback` has collected it.
    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Wait for the feedback task started at completion.
    ///
    /// Returns `None` if the lesson has not been finalized. A task that panicked
    /// or was cancelled yields the generic closing message.
    pub async fn await_feedback(&mut self) -> Option<&str> {
        if let Some(task) = self.feedback_task.take() {
            let text = task.await.unwrap_or_else(|err| {
                tracing::warn!(lesson_id = %self.lesson_id, error = %err, "feedback task failed");
                CLIENT_FALLBACK_FEEDBACK.to_string()
            });
            self.feedback = Some(text);
        }
        self.feedback.as_deref()
    }

    pub(crate) fn release_camera(&mut self) {
        if let Some(mut guard) = self.camera.take() {
            guard.release();
        }
    }
}
