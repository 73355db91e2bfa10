//! Text-generation backends for lesson feedback.

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::TextGenerationError;

pub const MAX_TOKENS: u32 = 300;
pub const TEMPERATURE: f32 = 0.7;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(system_instruction: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            prompt: prompt.into(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

/// A backend that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns `TextGenerationError` on transport failures, non-success
    /// statuses, or an empty completion.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, TextGenerationError>;
}

fn non_blank_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

//
// ─── OPENAI ───────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    /// Enabled by `OPENAI_API_KEY`; `LESSON_OPENAI_BASE_URL` and
    /// `LESSON_OPENAI_MODEL` override the defaults.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = non_blank_var("OPENAI_API_KEY")?;
        let base_url = non_blank_var("LESSON_OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".into());
        let model = non_blank_var("LESSON_OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// OpenAI-shaped chat completions.
#[derive(Clone)]
pub struct OpenAiChat {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiChat {
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, TextGenerationError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TextGenerationError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(TextGenerationError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

//
// ─── ANTHROPIC ────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl AnthropicConfig {
    /// Enabled by `ANTHROPIC_API_KEY`; `LESSON_ANTHROPIC_BASE_URL` and
    /// `LESSON_ANTHROPIC_MODEL` override the defaults.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = non_blank_var("ANTHROPIC_API_KEY")?;
        let base_url = non_blank_var("LESSON_ANTHROPIC_BASE_URL")
            .unwrap_or_else(|| "https://api.anthropic.com".into());
        let model = non_blank_var("LESSON_ANTHROPIC_MODEL")
            .unwrap_or_else(|| "claude-3-haiku-20240307".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Anthropic-shaped messages.
#[derive(Clone)]
pub struct AnthropicMessages {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicMessages {
    #[must_use]
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicMessages {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, TextGenerationError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let payload = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system_instruction,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TextGenerationError::HttpStatus(response.status()));
        }

        let body: MessagesResponse = response.json().await?;
        body.content
            .into_iter()
            .find_map(|block| block.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(TextGenerationError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Backends enabled by the environment, in priority order.
#[must_use]
pub fn generators_from_env() -> Vec<Arc<dyn TextGenerator>> {
    let mut generators: Vec<Arc<dyn TextGenerator>> = Vec::new();
    if let Some(config) = OpenAiConfig::from_env() {
        generators.push(Arc::new(OpenAiChat::new(config)));
    }
    if let Some(config) = AnthropicConfig::from_env() {
        generators.push(Arc::new(AnthropicMessages::new(config)));
    }
    generators
}
