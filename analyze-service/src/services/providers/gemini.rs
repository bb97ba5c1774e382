//! Gemini AI provider implementation.
//!
//! Implements text generation using Google's Gemini `generateContent`
//! REST method.

use super::{
    FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the API key, keeping it out of request URLs.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Model name without the `models/` resource prefix.
    fn model_id(&self) -> &str {
        self.config
            .model
            .strip_prefix("models/")
            .unwrap_or(&self.config.model)
    }

    /// Build the API URL for the configured model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            self.model_id(),
            method
        )
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("GEMINI_API_KEY is not set".to_string()))
    }
}

/// Build generation config from parameters; `None` lets the API defaults apply.
fn build_generation_config(params: &GenerationParams) -> Option<GenerationConfig> {
    if params.is_empty() {
        return None;
    }

    Some(GenerationConfig {
        temperature: params.temperature,
        max_output_tokens: params.max_output_tokens,
    })
}

/// Longest upstream error detail carried into a `ProviderError`, in chars.
const MAX_ERROR_DETAIL_CHARS: usize = 256;

/// Map a non-success HTTP status to a provider error.
fn error_from_status(status: StatusCode, body: &str) -> ProviderError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = envelope.as_ref().and_then(ErrorEnvelope::retry_after_secs);
        return ProviderError::RateLimited(retry_after);
    }

    let message = envelope
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    ProviderError::ApiError(format!(
        "Gemini API error {}: {}",
        status,
        truncate_detail(&message)
    ))
}

/// Cut `detail` to [`MAX_ERROR_DETAIL_CHARS`] on a char boundary.
fn truncate_detail(detail: &str) -> String {
    match detail.char_indices().nth(MAX_ERROR_DETAIL_CHARS) {
        Some((end, _)) => format!("{}...", &detail[..end]),
        None => detail.to_string(),
    }
}

/// Parse a protobuf `Duration` string such as `"34s"` or `"1.5s"`,
/// rounding up to whole seconds.
fn parse_retry_delay(delay: &str) -> Option<u64> {
    let secs: f64 = delay.trim().strip_suffix('s')?.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs.ceil() as u64)
}

/// Turn a decoded `generateContent` response into a completion.
fn completion_from_response(
    api_response: GenerateContentResponse,
) -> Result<ProviderResponse, ProviderError> {
    if let Some(reason) = api_response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(ProviderError::ContentFiltered(format!(
            "prompt blocked: {}",
            reason
        )));
    }

    let candidate = api_response
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") | None => FinishReason::Complete,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") => FinishReason::ContentFilter,
        Some(_) => FinishReason::Other,
    };

    if finish_reason == FinishReason::ContentFilter {
        return Err(ProviderError::ContentFiltered(
            "response blocked by safety filters".to_string(),
        ));
    }

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    let usage = api_response.usage_metadata.unwrap_or_default();

    Ok(ProviderResponse {
        text,
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
        finish_reason,
    })
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let api_key = self.api_key()?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: build_generation_config(params),
        };

        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url("generateContent"))
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_status(status, &body));
        }

        let api_response: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        completion_from_response(api_response)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.api_key().map(|_| ())
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// Only text parts matter here; other part kinds deserialize with `text: None`.
#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

/// Entry of `error.details`; only `google.rpc.RetryInfo` carries `retryDelay`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    retry_delay: Option<String>,
}

impl ErrorEnvelope {
    fn retry_after_secs(&self) -> Option<u64> {
        self.error
            .details
            .iter()
            .filter_map(|detail| detail.retry_delay.as_deref())
            .find_map(parse_retry_delay)
    }
}
