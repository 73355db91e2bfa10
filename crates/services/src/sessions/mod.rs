mod run;
mod workflow;

// Public API of the lesson session subsystem.
pub use crate::error::SessionError;
pub use run::LessonRun;
pub use workflow::{ConfirmOutcome, LessonLoopService, SignOutcome, VideoOutcome};
