use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "analyze-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint. Not ready while the provider lacks credentials.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.text_provider.as_ref();

    match provider.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "provider": provider.name(),
                "model": provider.model()
            })),
        ),
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "provider": provider.name(),
                    "error": e.to_string()
                })),
            )
        }
    }
}
