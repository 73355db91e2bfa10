use serde::{Deserialize, Serialize};

/// Classifier judgment for one camera-captured attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignVerdict {
    pub is_correct: bool,
    /// Confidence in percent, 0-100.
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_sign: Option<String>,
}

impl SignVerdict {
    #[must_use]
    pub fn new(is_correct: bool, confidence: f32, detected_sign: Option<String>) -> Self {
        Self {
            is_correct,
            confidence,
            detected_sign,
        }
        .normalized()
    }

    /// Clamp confidence into 0-100 and drop blank detected labels.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.detected_sign = self
            .detected_sign
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }
}
