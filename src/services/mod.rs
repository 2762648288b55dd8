pub mod audit;
pub mod breakdown;
pub mod detector;
pub mod execution;
pub mod grounding;
pub mod llm;
pub mod pipeline;
pub mod recommend;
pub mod root_cause;

pub use audit::{AuditError, AuditReceipt, AuditSink, ConsoleAuditSink, FileAuditSink};
pub use breakdown::{breakdown_by, DimensionBreakdown, DimensionSlice};
pub use detector::AnomalyDetector;
pub use execution::ExecutionProcessor;
pub use grounding::{
    DegradedClassification, GroundingValidator, RetryDecision, RetryStateMachine,
    ValidationResult, ValidationState, MAX_RETRIES,
};
pub use llm::{
    AdClassifier, ClassificationOutcome, HttpLlmClient, LlmClient, LlmError, ReasoningEnricher,
};
pub use pipeline::{AccountSummary, AnalysisReport, DetectionPass, PipelineService};
pub use recommend::{AnalyzedAnomaly, RecommendationEngine, RecommendationReport};
pub use root_cause::RootCauseAnalyzer;
