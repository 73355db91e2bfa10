//! End-of-lesson feedback: prompt building, text backends, the rule-based
//! fallback, and analytics recording.

mod prompt;
mod providers;
mod rules;
mod service;

pub use prompt::{SYSTEM_INSTRUCTION, build_prompt};
pub use providers::{
    AnthropicConfig, AnthropicMessages, GenerationRequest, MAX_TOKENS, OpenAiChat, OpenAiConfig,
    TEMPERATURE, TextGenerator, generators_from_env,
};
pub use rules::rule_based_feedback;
pub use service::{CLIENT_FALLBACK_FEEDBACK, FeedbackService, FeedbackSource, GeneratedFeedback};
