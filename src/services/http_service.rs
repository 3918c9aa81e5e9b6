use crate::contexts::{ExerciseService, ServiceError};
use crate::data::{review_messages, GenerationRequest, GenerationResult, ReviewPayload};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const GENERATE_PATH: &str = "generate";
const REVIEW_PATH: &str = "review";

/// Longest slice of an error body carried into a user-visible message.
const MAX_ERROR_BODY: usize = 500;

/// reqwest-backed implementation of ExerciseService talking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpExerciseService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpExerciseService {
    /// Creates a client for the backend at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Service root, e.g. `http://localhost:8000`
    /// * `timeout` - Ceiling applied to each whole request
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<String, ServiceError> {
        let url = self.endpoint(path);
        debug!(%url, "sending request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        info!(%url, status = status.as_u16(), bytes = text.len(), "backend responded");

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: error_detail(&text),
            });
        }
        Ok(text)
    }

    fn transport_error(&self, error: reqwest::Error) -> ServiceError {
        if error.is_timeout() {
            ServiceError::TimedOut(self.timeout)
        } else {
            ServiceError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl ExerciseService for HttpExerciseService {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ServiceError> {
        let body = self.post_json(GENERATE_PATH, request).await?;
        parse_generation_body(&body)
    }

    async fn review(&self, payload: &ReviewPayload) -> Result<Vec<String>, ServiceError> {
        let body = self.post_json(REVIEW_PATH, payload).await?;
        parse_review_body(&body)
    }
}

pub fn parse_generation_body(body: &str) -> Result<GenerationResult, ServiceError> {
    serde_json::from_str(body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

/// A blank body counts as "no feedback"; malformed JSON does not.
pub fn parse_review_body(body: &str) -> Result<Vec<String>, ServiceError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
    Ok(review_messages(&value))
}

/// Prefers the `detail` field of a JSON error body, falling back to the raw text.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    detail.chars().take(MAX_ERROR_BODY).collect()
}
