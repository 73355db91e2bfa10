use std::env;

use async_trait::async_trait;
use lesson_core::model::{ChallengeId, SignVerdict};
use reqwest::Client;
use reqwest::multipart::{Form, Part};

use crate::capture::VideoClip;
use crate::error::ClassifierError;

/// Judges whether a recorded clip shows the target sign.
#[async_trait]
pub trait SignClassifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `ClassifierError` when the classifier cannot be reached or
    /// answers with an error.
    async fn classify(
        &self,
        clip: &VideoClip,
        target_sign: &str,
        challenge_id: ChallengeId,
    ) -> Result<SignVerdict, ClassifierError>;
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub url: String,
}

impl ClassifierConfig {
    /// Reads `LESSON_CLASSIFIER_URL`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let url = env::var("LESSON_CLASSIFIER_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        Some(Self { url })
    }
}

/// Posts clips as multipart form data and reads a JSON verdict.
#[derive(Clone)]
pub struct HttpSignClassifier {
    client: Client,
    config: ClassifierConfig,
}

impl HttpSignClassifier {
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SignClassifier for HttpSignClassifier {
    async fn classify(
        &self,
        clip: &VideoClip,
        target_sign: &str,
        challenge_id: ChallengeId,
    ) -> Result<SignVerdict, ClassifierError> {
        let video = Part::bytes(clip.bytes.clone())
            .file_name("sign.webm")
            .mime_str(&clip.mime_type)?;
        let form = Form::new()
            .part("video", video)
            .text("targetSign", target_sign.to_string())
            .text("challengeId", challenge_id.to_string());

        let response = self
            .client
            .post(&self.config.url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), %challenge_id, "classifier rejected clip");
            return Err(ClassifierError::HttpStatus(response.status()));
        }

        let verdict: SignVerdict = response.json().await?;
        Ok(verdict.normalized())
    }
}
