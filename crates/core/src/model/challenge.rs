use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ChallengeId, OptionId};

//
// ─── CHALLENGE KIND ────────────────────────────────────────────────────────────
//

/// The closed set of challenge variants a lesson can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeKind {
    /// Select among options, one correct.
    #[serde(alias = "SELECT")]
    StandardChoice,
    /// Choice with a prompt bubble.
    Assist,
    /// Reference video shown, choose its meaning from options.
    VideoSelect,
    /// Teach-only: no choice, unlocks after a minimum dwell time.
    VideoLearn,
    /// Camera capture judged by an external classifier.
    SignDetect,
}

impl ChallengeKind {
    /// Returns true for the variants answered by picking an option.
    #[must_use]
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            ChallengeKind::StandardChoice | ChallengeKind::Assist | ChallengeKind::VideoSelect
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeKind::StandardChoice => "STANDARD_CHOICE",
            ChallengeKind::Assist => "ASSIST",
            ChallengeKind::VideoSelect => "VIDEO_SELECT",
            ChallengeKind::VideoLearn => "VIDEO_LEARN",
            ChallengeKind::SignDetect => "SIGN_DETECT",
        }
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeKind {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD_CHOICE" | "SELECT" => Ok(Self::StandardChoice),
            "ASSIST" => Ok(Self::Assist),
            "VIDEO_SELECT" => Ok(Self::VideoSelect),
            "VIDEO_LEARN" => Ok(Self::VideoLearn),
            "SIGN_DETECT" => Ok(Self::SignDetect),
            other => Err(ChallengeError::UnknownKind(other.to_string())),
        }
    }
}

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChallengeError {
    #[error("unknown challenge kind: {0}")]
    UnknownKind(String),

    #[error("challenge question cannot be empty")]
    EmptyQuestion,

    #[error("{kind} challenge requires options")]
    MissingOptions { kind: ChallengeKind },

    #[error("{kind} challenge must not carry options")]
    UnexpectedOptions { kind: ChallengeKind },

    #[error("choice challenge needs exactly one correct option, found {found}")]
    CorrectOptionCount { found: usize },

    #[error("duplicate option id {0}")]
    DuplicateOption(OptionId),
}

//
// ─── CHALLENGE ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeOption {
    pub id: OptionId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub correct: bool,
}

impl ChallengeOption {
    #[must_use]
    pub fn new(id: OptionId, text: impl Into<String>, correct: bool) -> Self {
        Self {
            id,
            text: text.into(),
            media_url: None,
            correct,
        }
    }

    #[must_use]
    pub fn with_media(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }
}

/// One scored or teach-only unit within a lesson.
///
/// Immutable once loaded. Construction validates the option layout against the
/// variant, so a choice challenge always has exactly one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    id: ChallengeId,
    kind: ChallengeKind,
    order: u32,
    question: String,
    video_url: Option<String>,
    completed: bool,
    options: Vec<ChallengeOption>,
}

impl Challenge {
    /// Build a validated challenge.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError` when the question is blank or the options do not
    /// fit the variant.
    pub fn new(
        id: ChallengeId,
        kind: ChallengeKind,
        order: u32,
        question: impl Into<String>,
        video_url: Option<String>,
        options: Vec<ChallengeOption>,
    ) -> Result<Self, ChallengeError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(ChallengeError::EmptyQuestion);
        }

        if kind.is_choice() {
            if options.is_empty() {
                return Err(ChallengeError::MissingOptions { kind });
            }
            let found = options.iter().filter(|o| o.correct).count();
            if found != 1 {
                return Err(ChallengeError::CorrectOptionCount { found });
            }
            for (idx, option) in options.iter().enumerate() {
                if options[..idx].iter().any(|o| o.id == option.id) {
                    return Err(ChallengeError::DuplicateOption(option.id));
                }
            }
        } else if !options.is_empty() {
            return Err(ChallengeError::UnexpectedOptions { kind });
        }

        let video_url = video_url.filter(|url| !url.trim().is_empty());

        Ok(Self {
            id,
            kind,
            order,
            question,
            video_url,
            completed: false,
            options,
        })
    }

    /// Marks whether progress was already recorded in a prior session.
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    #[must_use]
    pub fn id(&self) -> ChallengeId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ChallengeKind {
        self.kind
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn options(&self) -> &[ChallengeOption] {
        &self.options
    }

    #[must_use]
    pub fn has_option(&self, id: OptionId) -> bool {
        self.options.iter().any(|o| o.id == id)
    }

    /// The single correct option of a choice challenge.
    #[must_use]
    pub fn correct_option(&self) -> Option<&ChallengeOption> {
        self.options.iter().find(|o| o.correct)
    }

    /// Label the classifier is asked to recognise.
    ///
    /// Prompts are written as `Perform the sign: "hello"`; the quoted part is the
    /// label. Without quotes the whole question is used.
    #[must_use]
    pub fn target_sign(&self) -> &str {
        let question = self.question.trim();
        if let Some(start) = question.find('"') {
            let rest = &question[start + 1..];
            if let Some(end) = rest.find('"') {
                let label = rest[..end].trim();
                if !label.is_empty() {
                    return label;
                }
            }
        }
        question
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
