//! AI provider abstractions and implementations.
//!
//! The analyze handler only sees [`TextProvider`], so the Gemini backend
//! can be swapped for the mock one (or any other "prompt in, text out"
//! service) without touching the HTTP layer.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    /// Upstream quota exhausted, with the suggested wait in seconds when known.
    #[error("Rate limited")]
    RateLimited(Option<u64>),

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Provider returned no candidates")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::ContentFiltered(_) => "content_filtered",
            ProviderError::EmptyResponse => "empty_response",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => AppError::ServiceUnavailable(msg),
            ProviderError::RateLimited(retry_after) => {
                AppError::TooManyRequests("Upstream rate limit exceeded".to_string(), retry_after)
            }
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated text. May be empty.
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Complete => "complete",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other => "other",
        }
    }
}

/// Generation parameters for AI requests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_output_tokens: Option<i32>,
}

impl GenerationParams {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

/// Trait for text generation providers (e.g., Gemini).
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider label, used in logs and metrics.
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Generate a single text completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Local readiness check. Must not call the upstream service.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
