use thiserror::Error;

use crate::evaluator::SessionStateError;
use crate::model::{ChallengeError, ParseIdError, SummaryError};

/// Any error raised by the domain layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
