//! Domain models for the analyze service.

pub mod analysis;

pub use analysis::AnalysisResult;
