use crate::data::{GenerationRequest, GenerationResult, ReviewPayload};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors crossing the network boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Backend error: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Request was cancelled")]
    Cancelled,
}

/// The remote exercise backend: one call to generate an exercise, one to
/// review a submission.
#[async_trait]
pub trait ExerciseService: Send + Sync {
    /// Requests a new exercise. A returned `GenerationResult` may still carry
    /// a failure status; judging it is the caller's job.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ServiceError>;

    /// Submits a review payload and returns the feedback messages, possibly none.
    async fn review(&self, payload: &ReviewPayload) -> Result<Vec<String>, ServiceError>;
}
