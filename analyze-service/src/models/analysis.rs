use serde::{Deserialize, Serialize};

/// Response body of `GET /analyze`. Built per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub result: String,
}

impl AnalysisResult {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}
