//! Application startup and lifecycle management.
//!
//! Builds the text provider from configuration, wires it into the HTTP
//! router and runs the server until a shutdown signal arrives.

use crate::config::{AnalyzeConfig, CorsConfig, ProviderKind};
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::init_metrics;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::{GenerationParams, TextProvider};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn;
use axum::{routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, REQUEST_ID_HEADER};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AnalyzeConfig,
    pub text_provider: Arc<dyn TextProvider>,
    pub generation_params: GenerationParams,
}

impl AppState {
    pub fn new(config: AnalyzeConfig, text_provider: Arc<dyn TextProvider>) -> Self {
        let generation_params = config.generation_params();
        Self {
            config,
            text_provider,
            generation_params,
        }
    }
}

/// Construct the provider selected by `GENAI_PROVIDER`.
pub fn build_text_provider(config: &AnalyzeConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    match config.provider {
        ProviderKind::Gemini => {
            if config.google.api_key.is_none() {
                tracing::warn!(
                    "GEMINI_API_KEY is not set; /analyze will fail until it is configured"
                );
            }

            let provider = GeminiTextProvider::new(GeminiConfig {
                api_key: config.google.api_key.clone(),
                model: config.models.text_model.clone(),
                api_base: config.google.api_base.clone(),
                timeout: config.request_timeout(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

            tracing::info!(
                model = %config.models.text_model,
                api_base = %config.google.api_base,
                "Initialized Gemini text provider"
            );

            Ok(Arc::new(provider))
        }
        ProviderKind::Mock => {
            tracing::info!("Initialized mock text provider");
            Ok(Arc::new(MockTextProvider::replying(config.mock.response.clone())))
        }
    }
}

fn cors_layer(cors: &CorsConfig) -> Result<CorsLayer, AppError> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(REQUEST_ID_HEADER)]);

    if cors.allows_any_origin() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = cors
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "CORS_ALLOWED_ORIGINS contains invalid origin '{}': {}",
                    origin,
                    e
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config.cors)?;

    let router = Router::new()
        .route("/analyze", get(handlers::analyze))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(from_fn(http_metrics_middleware))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state);

    Ok(router)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AnalyzeConfig) -> Result<Self, AppError> {
        let text_provider = build_text_provider(&config)?;
        Self::build_with_provider(config, text_provider).await
    }

    /// Build the application around an already constructed provider.
    pub async fn build_with_provider(
        config: AnalyzeConfig,
        text_provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let address = config.common.address();
        let state = AppState::new(config, text_provider);
        let router = build_router(state)?;

        // Port 0 picks a random port, used by the tests
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Analyze service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal is received.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
