//! Camera lifecycle for sign-detection challenges.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use lesson_core::model::ChallengeId;

use crate::error::CaptureError;

/// Upper bound on a single recording.
pub const MAX_RECORDING: Duration = Duration::from_secs(5);

/// An encoded recording handed to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl VideoClip {
    #[must_use]
    pub fn webm(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "video/webm".into(),
        }
    }
}

/// A camera that can be opened for a live stream.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// # Errors
    ///
    /// Returns `CaptureError::PermissionDenied`, `NotFound` or `Busy` when the
    /// camera cannot be opened.
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// An open camera stream.
#[async_trait]
pub trait CaptureStream: Send {
    /// # Errors
    ///
    /// Returns `CaptureError` if recording cannot start.
    async fn start_recording(&mut self) -> Result<(), CaptureError>;

    /// # Errors
    ///
    /// Returns `CaptureError::NotRecording` if no recording is running.
    async fn stop_recording(&mut self) -> Result<VideoClip, CaptureError>;

    /// Stop all tracks. Called exactly once by `CameraGuard`.
    fn release(&mut self);
}

/// Owns an open stream for one `SIGN_DETECT` challenge and releases it
/// exactly once, on `release` or on drop, whichever comes first.
pub struct CameraGuard {
    challenge_id: ChallengeId,
    stream: Option<Box<dyn CaptureStream>>,
}

impl std::fmt::Debug for CameraGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraGuard")
            .field("challenge_id", &self.challenge_id)
            .field("released", &self.is_released())
            .finish()
    }
}

impl CameraGuard {
    /// Open the camera for `challenge_id`.
    ///
    /// # Errors
    ///
    /// Propagates the device's `CaptureError`.
    pub async fn acquire(
        device: &dyn CaptureDevice,
        challenge_id: ChallengeId,
    ) -> Result<Self, CaptureError> {
        let stream = device.open().await?;
        tracing::debug!(%challenge_id, "camera acquired");
        Ok(Self {
            challenge_id,
            stream: Some(stream),
        })
    }

    #[must_use]
    pub fn challenge_id(&self) -> ChallengeId {
        self.challenge_id
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// Release the stream. Further calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            tracing::debug!(challenge_id = %self.challenge_id, "camera released");
        }
    }

    /// Record until `stop` resolves or `cap` elapses, whichever is first.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::Released` after `release`, or the stream's error.
    pub async fn record_clip<F>(&mut self, stop: F, cap: Duration) -> Result<VideoClip, CaptureError>
    where
        F: Future<Output = ()> + Send,
    {
        let stream = self.stream.as_mut().ok_or(CaptureError::Released)?;
        stream.start_recording().await?;
        tokio::select! {
            () = stop => {}
            () = tokio::time::sleep(cap) => {
                tracing::debug!(challenge_id = %self.challenge_id, "recording cap reached");
            }
        }
        stream.stop_recording().await
    }
}

impl Drop for CameraGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Camera double counting opens, recordings and releases.
    #[derive(Clone, Default)]
    pub(crate) struct FakeCamera {
        pub opens: Arc<AtomicUsize>,
        pub recordings: Arc<AtomicUsize>,
        pub releases: Arc<AtomicUsize>,
        pub fail_with: Option<CaptureError>,
    }

    impl FakeCamera {
        pub(crate) fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        pub(crate) fn recordings(&self) -> usize {
            self.recordings.load(Ordering::SeqCst)
        }

        pub(crate) fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    struct FakeStream {
        recordings: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
        recording: bool,
    }

    #[async_trait]
    impl CaptureDevice for FakeCamera {
        async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeStream {
                recordings: Arc::clone(&self.recordings),
                releases: Arc::clone(&self.releases),
                recording: false,
            }))
        }
    }

    #[async_trait]
    impl CaptureStream for FakeStream {
        async fn start_recording(&mut self) -> Result<(), CaptureError> {
            self.recordings.fetch_add(1, Ordering::SeqCst);
            self.recording = true;
            Ok(())
        }

        async fn stop_recording(&mut self) -> Result<VideoClip, CaptureError> {
            if !self.recording {
                return Err(CaptureError::NotRecording);
            }
            self.recording = false;
            Ok(VideoClip::webm(vec![1, 2, 3]))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
