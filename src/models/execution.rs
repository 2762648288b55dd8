use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recommendation::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of applying (or simulating) one recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub ad_id: String,
    pub ad_name: String,
    pub action: Action,
    pub status: ExecutionStatus,
    pub message: String,
    /// Action-specific payload (amount stopped, old/new budget, manual flag).
    pub details: serde_json::Value,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_processed: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub dry_run: bool,
}

/// Full batch result handed to the audit sink and the response layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionBatch {
    pub batch_id: String,
    pub results: Vec<ExecutionRecord>,
    pub summary: ExecutionSummary,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionBatch {
    /// Counts must always partition the processed set.
    pub fn counts_consistent(&self) -> bool {
        let s = &self.summary;
        s.success + s.failed + s.skipped == s.total_processed
            && s.total_processed == self.results.len()
    }
}
