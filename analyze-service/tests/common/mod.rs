#![allow(dead_code)]

use analyze_service::config::AnalyzeConfig;
use analyze_service::services::providers::TextProvider;
use analyze_service::startup::Application;
use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Build a config on 127.0.0.1:0 from the given variables only.
pub fn test_config(vars: &[(&str, &str)]) -> AnalyzeConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let common = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
    };

    AnalyzeConfig::from_lookup(common, |key| vars.get(key).cloned())
        .expect("Failed to build test configuration")
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application with the provider chosen by `config`.
    pub async fn spawn(config: AnalyzeConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    /// Spawn the application around a provider supplied by the test.
    pub async fn spawn_with_provider(provider: Arc<dyn TextProvider>) -> Self {
        let app = Application::build_with_provider(test_config(&[]), provider)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    async fn start(app: Application) -> Self {
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Self {
            address,
            port,
            client,
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }
}
