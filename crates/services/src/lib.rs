#![forbid(unsafe_code)]

pub mod app_services;
pub mod capture;
pub mod classifier;
pub mod error;
pub mod feedback;
pub mod identity;
pub mod sessions;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use capture::{CameraGuard, CaptureDevice, CaptureStream, MAX_RECORDING, VideoClip};
pub use classifier::{ClassifierConfig, HttpSignClassifier, SignClassifier};
pub use error::{
    AppServicesError, CaptureError, ClassifierError, FeedbackError, GENERIC_USER_MESSAGE,
    SessionError, TextGenerationError,
};
pub use feedback::{CLIENT_FALLBACK_FEEDBACK, FeedbackService, FeedbackSource, GeneratedFeedback};
pub use identity::{Credentials, IdentityProvider, StaticTokenIdentity};
pub use sessions::{ConfirmOutcome, LessonLoopService, LessonRun, SignOutcome, VideoOutcome};
