//! HTTP surface: the feedback endpoint and a health check.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use lesson_core::model::{LessonId, LessonPerformanceSummary};
use services::{AppServices, Credentials, FeedbackError, FeedbackService, IdentityProvider};

#[derive(Clone)]
pub struct AppState {
    identity: Arc<dyn IdentityProvider>,
    feedback: Arc<FeedbackService>,
}

impl AppState {
    pub fn new(identity: Arc<dyn IdentityProvider>, feedback: Arc<FeedbackService>) -> Self {
        Self { identity, feedback }
    }

    pub fn from_services(services: &AppServices) -> Self {
        Self::new(services.identity(), services.feedback())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate-feedback", post(generate_feedback))
        .with_state(state)
}

pub async fn health() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub lesson_id: LessonId,
    pub metrics: LessonPerformanceSummary,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub feedback: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// POST /api/generate-feedback
///
/// Authentication is checked before the body is looked at, so an anonymous
/// caller gets 401 even with a malformed payload.
pub async fn generate_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Response {
    let credentials = Credentials::from_authorization_header(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok()),
    );
    let Some(user) = state.identity.resolve(&credentials).await else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected feedback payload");
            return error(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match state
        .feedback
        .generate_for_user(&user, request.lesson_id, &request.metrics)
        .await
    {
        Ok(generated) => Json(FeedbackResponse {
            feedback: generated.text,
        })
        .into_response(),
        Err(FeedbackError::InvalidInput(err)) => {
            tracing::debug!(lesson_id = %request.lesson_id, error = %err, "invalid lesson metrics");
            error(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(FeedbackError::Unauthorized) => error(StatusCode::UNAUTHORIZED, "Unauthorized"),
        Err(err) => {
            tracing::error!(lesson_id = %request.lesson_id, error = %err, "feedback request failed");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate feedback",
            )
        }
    }
}
