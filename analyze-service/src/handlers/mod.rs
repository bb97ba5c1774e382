//! HTTP handlers for the analyze service.

pub mod analyze;
pub mod health;
pub mod metrics;

pub use analyze::{analyze, ANALYZE_PROMPT};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_endpoint;
