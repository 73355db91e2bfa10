use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::classifier::{ClassifierConfig, HttpSignClassifier};
use crate::error::AppServicesError;
use crate::feedback::FeedbackService;
use crate::identity::{IdentityProvider, StaticTokenIdentity};
use crate::sessions::LessonLoopService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    identity: Arc<dyn IdentityProvider>,
    feedback: Arc<FeedbackService>,
    lesson_loop: Arc<LessonLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, configured from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock))
    }

    /// Build services over in-memory storage. Handy for tests and demos.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock)
    }

    /// Wire services over `storage`, reading tokens, text backends and the
    /// classifier endpoint from the environment.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let identity = StaticTokenIdentity::from_env().unwrap_or_else(|| {
            tracing::warn!("LESSON_API_TOKENS not set; every feedback request will be rejected");
            StaticTokenIdentity::new()
        });
        Self::with_identity(storage, clock, Arc::new(identity))
    }

    /// Like `from_storage`, with an explicit identity provider.
    #[must_use]
    pub fn with_identity(
        storage: Storage,
        clock: Clock,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let feedback = Arc::new(
            FeedbackService::new(clock, Arc::clone(&identity), Arc::clone(&storage.analytics))
                .with_env_generators(),
        );
        tracing::info!(backends = ?feedback.backend_names(), "feedback backends configured");

        let mut lesson_loop = LessonLoopService::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
            Arc::clone(&feedback),
        );
        if let Some(config) = ClassifierConfig::from_env() {
            tracing::info!(url = %config.url, "sign classifier configured");
            lesson_loop = lesson_loop.with_classifier(Arc::new(HttpSignClassifier::new(config)));
        }

        Self {
            storage,
            identity,
            feedback,
            lesson_loop: Arc::new(lesson_loop),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.identity)
    }

    #[must_use]
    pub fn feedback(&self) -> Arc<FeedbackService> {
        Arc::clone(&self.feedback)
    }

    #[must_use]
    pub fn lesson_loop(&self) -> Arc<LessonLoopService> {
        Arc::clone(&self.lesson_loop)
    }
}
