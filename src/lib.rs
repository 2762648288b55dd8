//! Ad spend anomaly analysis library.
//!
//! Pipeline stages: detection, root-cause analysis, recommendation,
//! grounding-validated enrichment, and batch execution with audit logging.

pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use services::{
    AnalysisReport, AnomalyDetector, ExecutionProcessor, FileAuditSink, GroundingValidator,
    HttpLlmClient, PipelineService, RecommendationEngine, RootCauseAnalyzer,
};

#[cfg(test)]
mod tests;
