use crate::models::AnalysisResult;
use crate::services::metrics;
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;
use std::time::Instant;

/// Prompt sent upstream on every call.
pub const ANALYZE_PROMPT: &str = "Say API working";

/// `GET /analyze`: ask the provider for a completion of [`ANALYZE_PROMPT`].
///
/// Takes no input; query strings and bodies are ignored. Each call makes
/// its own upstream request.
pub async fn analyze(State(state): State<AppState>) -> Result<Json<AnalysisResult>, AppError> {
    let provider = state.text_provider.as_ref();
    let start = Instant::now();

    let outcome = provider
        .generate(ANALYZE_PROMPT, &state.generation_params)
        .await;

    let elapsed = start.elapsed();
    metrics::record_provider_latency(provider.name(), provider.model(), elapsed.as_secs_f64());

    match outcome {
        Ok(response) => {
            metrics::record_genai_request(
                provider.name(),
                provider.model(),
                response.finish_reason.as_str(),
            );
            metrics::record_tokens(
                provider.model(),
                response.input_tokens,
                response.output_tokens,
            );

            tracing::info!(
                provider = provider.name(),
                model = provider.model(),
                latency_ms = elapsed.as_millis() as u64,
                input_tokens = response.input_tokens,
                output_tokens = response.output_tokens,
                finish_reason = response.finish_reason.as_str(),
                "Analysis completed"
            );

            Ok(Json(AnalysisResult::new(response.text)))
        }
        Err(e) => {
            metrics::record_provider_error(provider.name(), e.error_type());

            tracing::error!(
                provider = provider.name(),
                model = provider.model(),
                latency_ms = elapsed.as_millis() as u64,
                error = %e,
                "Analysis failed"
            );

            Err(e.into())
        }
    }
}
