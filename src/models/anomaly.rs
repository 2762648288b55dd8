use serde::{Deserialize, Serialize};

use super::record::{Metric, MetricRecord};

/// Severity tier for a standardized score, ordered by magnitude.
///
/// Cut points are configurable (see `DetectorConfig`) but must stay ordered
/// mild < significant < extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Mild,
    Significant,
    Extreme,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Mild => "mild",
            Severity::Significant => "significant",
            Severity::Extreme => "extreme",
        }
    }
}

/// Flagging policy relative to the threshold. Individual anomalies always
/// resolve to `High` or `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    High,
    Low,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::High => "high",
            Direction::Low => "low",
            Direction::Both => "both",
        }
    }
}

/// Baseline statistics over the eligible population (raw-value mode only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub count: usize,
}

/// One flagged record. Carries its own copy of the source record so reports
/// remain self-contained after the input collection is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub record: MetricRecord,
    pub metric: Metric,
    pub value: f64,
    /// Population mean the score was computed against. Absent in
    /// pre-computed-score mode where the baseline lives upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    pub score: f64,
    pub direction: Direction,
    pub severity: Severity,
}

/// Detection output: either anomalies plus the baseline used, or an empty
/// list with a warning explaining why nothing could be flagged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionReport {
    pub anomalies: Vec<Anomaly>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_stats: Option<BaselineStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl DetectionReport {
    pub fn warning(message: impl Into<String>) -> Self {
        Self { anomalies: vec![], baseline_stats: None, warning: Some(message.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Mild < Severity::Significant);
        assert!(Severity::Significant < Severity::Extreme);
        assert_eq!(Severity::Extreme.as_str(), "extreme");
    }

    #[test]
    fn test_warning_report_is_empty() {
        let report = DetectionReport::warning("too few records");
        assert!(report.anomalies.is_empty());
        assert_eq!(report.warning.as_deref(), Some("too few records"));
    }
}
