//! Mock provider implementation for local runs and tests.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::Mutex;

/// Failure the mock provider reproduces on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotConfigured,
    RateLimited,
    Network,
    Api,
}

impl MockFailure {
    fn to_error(self) -> ProviderError {
        match self {
            MockFailure::NotConfigured => {
                ProviderError::NotConfigured("Mock text provider not enabled".to_string())
            }
            MockFailure::RateLimited => ProviderError::RateLimited(Some(30)),
            MockFailure::Network => ProviderError::NetworkError("mock connection reset".to_string()),
            MockFailure::Api => ProviderError::ApiError("mock upstream failure".to_string()),
        }
    }
}

enum Behavior {
    Reply(String),
    Fail(MockFailure),
}

/// Mock text provider that answers with a fixed reply (or a fixed error)
/// and remembers every prompt it was given.
pub struct MockTextProvider {
    behavior: Behavior,
    prompts: Mutex<Vec<String>>,
}

impl MockTextProvider {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Reply(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: MockFailure) -> Self {
        Self {
            behavior: Behavior::Fail(failure),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|prompts| prompts.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match &self.behavior {
            Behavior::Reply(text) => Ok(ProviderResponse {
                text: text.clone(),
                input_tokens: prompt.len() as i32 / 4,
                output_tokens: text.len() as i32 / 4,
                finish_reason: FinishReason::Complete,
            }),
            Behavior::Fail(failure) => Err(failure.to_error()),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match &self.behavior {
            Behavior::Fail(MockFailure::NotConfigured) => {
                Err(MockFailure::NotConfigured.to_error())
            }
            _ => Ok(()),
        }
    }
}
