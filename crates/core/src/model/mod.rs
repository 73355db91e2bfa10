mod challenge;
mod ids;
mod metric;
mod summary;
mod verdict;

pub use ids::{ChallengeId, LessonId, OptionId, ParseIdError, UserId};

pub use challenge::{Challenge, ChallengeError, ChallengeKind, ChallengeOption};
pub use metric::{ChallengeMetric, MetricsRecorder};
pub use summary::{
    ChallengeDetail, FeedbackRates, LessonPerformanceSummary, POINTS_PER_CHALLENGE, SummaryError,
};
pub use verdict::SignVerdict;
