//! service-core: Shared infrastructure for the analyze service.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
pub use tracing;
