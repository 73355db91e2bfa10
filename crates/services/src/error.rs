//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::SessionStateError;
use lesson_core::model::SummaryError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Toast text shown for every failure except authorization.
pub const GENERIC_USER_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors emitted by text-generation backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TextGenerationError {
    #[error("backend returned an empty response")]
    EmptyResponse,
    #[error("backend request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the sign classifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClassifierError {
    #[error("classifier request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by a media-capture device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera found")]
    NotFound,
    #[error("camera is in use by another application")]
    Busy,
    #[error("camera was already released")]
    Released,
    #[error("no recording in progress")]
    NotRecording,
    #[error("capture failed: {0}")]
    Other(String),
}

impl CaptureError {
    /// Text shown next to the camera preview.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => {
                "Camera access was denied. Please allow camera access in your browser settings."
            }
            CaptureError::NotFound => "No camera found. Please connect a camera and try again.",
            CaptureError::Busy => "Camera is already in use by another application.",
            _ => "Could not access the camera. Please try again.",
        }
    }
}

/// Errors emitted by `FeedbackService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid lesson metrics: {0}")]
    InvalidInput(#[from] SummaryError),
}

/// Errors emitted by lesson session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("lesson has no challenges")]
    Empty,
    #[error("lesson already completed")]
    Completed,
    #[error("current challenge does not use the camera")]
    NotSignChallenge,
    #[error("sign classifier is not configured")]
    ClassifierUnavailable,
    #[error(transparent)]
    State(SessionStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl From<SessionStateError> for SessionError {
    fn from(err: SessionStateError) -> Self {
        match err {
            SessionStateError::Empty => SessionError::Empty,
            other => SessionError::State(other),
        }
    }
}

impl SessionError {
    /// Text for the transient toast shown to the learner.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::Capture(err) => err.user_message(),
            _ => GENERIC_USER_MESSAGE,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::ChallengeId;

    #[test]
    fn session_errors_use_generic_toast() {
        let err = SessionError::from(StorageError::Connection("down".into()));
        assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);

        let err = SessionError::from(SessionStateError::NotAwaitingPersist(ChallengeId::new(1)));
        assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);
    }

    #[test]
    fn empty_state_error_maps_to_empty() {
        assert!(matches!(
            SessionError::from(SessionStateError::Empty),
            SessionError::Empty
        ));
    }

    #[test]
    fn capture_errors_have_specific_messages() {
        let err = SessionError::from(CaptureError::Busy);
        assert_eq!(
            err.user_message(),
            "Camera is already in use by another application."
        );
    }
}
