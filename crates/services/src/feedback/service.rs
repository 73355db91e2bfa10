use std::sync::Arc;

use lesson_core::Clock;
use lesson_core::model::{FeedbackRates, LessonId, LessonPerformanceSummary, UserId};
use storage::repository::{LessonAnalyticsRecord, LessonAnalyticsRepository};

use super::prompt::{SYSTEM_INSTRUCTION, build_prompt};
use super::providers::{GenerationRequest, TextGenerator, generators_from_env};
use super::rules::rule_based_feedback;
use crate::error::FeedbackError;
use crate::identity::{Credentials, IdentityProvider};

/// Shown by the lesson player when feedback could not be produced at all.
pub const CLIENT_FALLBACK_FEEDBACK: &str =
    "Great job completing the lesson! Keep practicing to improve your sign language skills.";

/// Where a feedback text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSource {
    Backend(&'static str),
    Rules,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFeedback {
    pub text: String,
    pub source: FeedbackSource,
    /// Row id of the stored analytics record, `None` if storing failed.
    pub analytics_id: Option<i64>,
}

/// Produces end-of-lesson feedback and records lesson analytics.
#[derive(Clone)]
pub struct FeedbackService {
    clock: Clock,
    identity: Arc<dyn IdentityProvider>,
    generators: Vec<Arc<dyn TextGenerator>>,
    analytics: Arc<dyn LessonAnalyticsRepository>,
}

impl FeedbackService {
    /// A service with no text backends; feedback is rule based until
    /// generators are added.
    #[must_use]
    pub fn new(
        clock: Clock,
        identity: Arc<dyn IdentityProvider>,
        analytics: Arc<dyn LessonAnalyticsRepository>,
    ) -> Self {
        Self {
            clock,
            identity,
            generators: Vec::new(),
            analytics,
        }
    }

    /// Use the backends enabled by the environment.
    #[must_use]
    pub fn with_env_generators(self) -> Self {
        self.with_generators(generators_from_env())
    }

    /// Replace the backend list. Earlier entries are tried first.
    #[must_use]
    pub fn with_generators(mut self, generators: Vec<Arc<dyn TextGenerator>>) -> Self {
        self.generators = generators;
        self
    }

    #[must_use]
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    /// Authenticate the caller, then generate and record feedback.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::Unauthorized` before any other work when the
    /// credentials do not resolve, and `FeedbackError::InvalidInput` for
    /// inconsistent metrics.
    pub async fn generate_for_request(
        &self,
        credentials: &Credentials,
        lesson_id: LessonId,
        summary: &LessonPerformanceSummary,
    ) -> Result<GeneratedFeedback, FeedbackError> {
        let user = self
            .identity
            .resolve(credentials)
            .await
            .ok_or(FeedbackError::Unauthorized)?;
        self.generate_for_user(&user, lesson_id, summary).await
    }

    /// Generate and record feedback for an already identified user.
    ///
    /// Backend failures fall back to the rule generator. A failed analytics
    /// write is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::InvalidInput` for inconsistent metrics, before
    /// any backend is contacted.
    pub async fn generate_for_user(
        &self,
        user: &UserId,
        lesson_id: LessonId,
        summary: &LessonPerformanceSummary,
    ) -> Result<GeneratedFeedback, FeedbackError> {
        summary.validate()?;
        let rates = summary.rates()?;

        let (text, source) = self.compose(summary, &rates).await;
        tracing::info!(%lesson_id, ?source, "lesson feedback generated");

        let analytics_id = self.record(user, lesson_id, summary, &text).await;
        Ok(GeneratedFeedback {
            text,
            source,
            analytics_id,
        })
    }

    async fn compose(
        &self,
        summary: &LessonPerformanceSummary,
        rates: &FeedbackRates,
    ) -> (String, FeedbackSource) {
        if !self.generators.is_empty() {
            let request = GenerationRequest::new(SYSTEM_INSTRUCTION, build_prompt(summary, rates));
            for generator in &self.generators {
                match generator.generate(&request).await {
                    Ok(text) if !text.trim().is_empty() => {
                        return (
                            text.trim().to_string(),
                            FeedbackSource::Backend(generator.name()),
                        );
                    }
                    Ok(_) => {
                        tracing::warn!(provider = generator.name(), "backend returned empty text");
                    }
                    Err(err) => {
                        tracing::warn!(provider = generator.name(), error = %err, "backend failed");
                    }
                }
            }
        }
        (rule_based_feedback(rates), FeedbackSource::Rules)
    }

    async fn record(
        &self,
        user: &UserId,
        lesson_id: LessonId,
        summary: &LessonPerformanceSummary,
        feedback: &str,
    ) -> Option<i64> {
        let record = match LessonAnalyticsRecord::from_summary(
            user.clone(),
            lesson_id,
            summary,
            feedback,
            self.clock.now(),
        ) {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(%lesson_id, error = %err, "failed to encode lesson analytics");
                return None;
            }
        };
        match self.analytics.insert_analytics(&record).await {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::error!(%lesson_id, error = %err, "failed to store lesson analytics");
                None
            }
        }
    }
}
