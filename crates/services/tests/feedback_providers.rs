use std::sync::Arc;

use lesson_core::model::{ChallengeDetail, ChallengeKind, LessonId, LessonPerformanceSummary, UserId};
use lesson_core::time::fixed_clock;
use services::feedback::{
    AnthropicConfig, AnthropicMessages, GenerationRequest, OpenAiChat, OpenAiConfig,
    TextGenerator,
};
use services::{Credentials, FeedbackService, FeedbackSource, StaticTokenIdentity, TextGenerationError};
use storage::repository::{InMemoryRepository, LessonAnalyticsRepository};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> GenerationRequest {
    GenerationRequest::new("Be kind.", "How did I do?")
}

fn openai(server: &MockServer) -> OpenAiChat {
    OpenAiChat::new(OpenAiConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: "sk-test".into(),
        model: "gpt-4o-mini".into(),
    })
}

fn anthropic(server: &MockServer) -> AnthropicMessages {
    AnthropicMessages::new(AnthropicConfig {
        base_url: server.uri(),
        api_key: "ak-test".into(),
        model: "claude-3-haiku-20240307".into(),
    })
}

fn backends(server: &MockServer) -> Vec<Arc<dyn TextGenerator>> {
    vec![Arc::new(openai(server)), Arc::new(anthropic(server))]
}

fn summary() -> LessonPerformanceSummary {
    LessonPerformanceSummary {
        total_challenges: 4,
        correct_first_try: 2,
        total_retries: 3,
        total_time_seconds: 80,
        points_earned: 40,
        challenge_details: vec![ChallengeDetail {
            kind: ChallengeKind::SignDetect,
            retries: 3,
            time_spent: 30,
        }],
    }
}

#[tokio::test]
async fn openai_request_carries_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "max_tokens": 300,
            "messages": [
                { "role": "system", "content": "Be kind." },
                { "role": "user", "content": "How did I do?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": " Well done! " } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = openai(&server).generate(&request()).await.unwrap();
    assert_eq!(text, "Well done!");
}

#[tokio::test]
async fn anthropic_request_uses_api_key_header_and_system_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-3-haiku-20240307",
            "system": "Be kind.",
            "messages": [{ "role": "user", "content": "How did I do?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "type": "text", "text": "Keep going." }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = anthropic(&server).generate(&request()).await.unwrap();
    assert_eq!(text, "Keep going.");
}

#[tokio::test]
async fn blank_completion_is_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "   " } }]
        })))
        .mount(&server)
        .await;

    let err = openai(&server).generate(&request()).await.unwrap_err();
    assert!(matches!(err, TextGenerationError::EmptyResponse));
}

#[tokio::test]
async fn falls_through_failing_backend_to_the_next() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "type": "text", "text": "Nice signing." }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repo = InMemoryRepository::new();
    let identity = StaticTokenIdentity::new().with_token("tok", UserId::new("bo"));
    let service = FeedbackService::new(fixed_clock(), Arc::new(identity), Arc::new(repo.clone()))
        .with_generators(backends(&server));

    let feedback = service
        .generate_for_request(&Credentials::bearer("tok"), LessonId::new(2), &summary())
        .await
        .unwrap();
    assert_eq!(feedback.text, "Nice signing.");
    assert_eq!(feedback.source, FeedbackSource::Backend("anthropic"));

    let stored = repo.list_analytics(&UserId::new("bo"), 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].total_retries, 3);
}

#[tokio::test]
async fn every_backend_down_uses_rule_feedback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = FeedbackService::new(
        fixed_clock(),
        Arc::new(StaticTokenIdentity::new()),
        Arc::new(InMemoryRepository::new()),
    )
    .with_generators(backends(&server));

    let feedback = service
        .generate_for_user(&UserId::new("bo"), LessonId::new(2), &summary())
        .await
        .unwrap();
    assert_eq!(feedback.source, FeedbackSource::Rules);
    assert!(feedback.text.starts_with("Lesson Summary"));
}
