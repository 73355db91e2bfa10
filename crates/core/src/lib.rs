#![forbid(unsafe_code)]

pub mod error;
pub mod evaluator;
pub mod model;
pub mod sequencer;
pub mod time;

pub use error::Error;
pub use evaluator::{
    AttemptStatus, ConfirmStep, FiredAction, LessonSession, PendingAction, PersistApplied,
    ScheduledAction, SessionStateError, SignStep, VideoStep,
};
pub use sequencer::ChallengeSequencer;
pub use time::Clock;
