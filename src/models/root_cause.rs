use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Impact tier of a contributing factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }
}

/// One explanatory factor for an anomaly. The finding text embeds the
/// observed value and the data-driven threshold it was compared against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCauseFinding {
    pub factor: String,
    pub finding: String,
    pub impact: Impact,
    pub suggestion: String,
}

/// Counts of triggered findings per impact tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub high_impact_factors: usize,
    pub medium_impact_factors: usize,
    pub low_impact_factors: usize,
}

/// Full root-cause output for one anomalous record.
///
/// `peer_comparison` uses a BTreeMap so serialized reports are deterministic
/// regardless of dimension evaluation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCauseReport {
    pub anomaly_summary: String,
    pub root_causes: Vec<RootCauseFinding>,
    pub comparison_to_similar: BTreeMap<String, f64>,
    pub recommended_actions: Vec<String>,
    pub impact_summary: ImpactSummary,
}

impl RootCauseReport {
    /// Factor keys of the strongest findings, high impact first.
    pub fn top_factors(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<&RootCauseFinding> = self.root_causes.iter().collect();
        ranked.sort_by(|a, b| b.impact.cmp(&a.impact));
        ranked.into_iter().take(n).map(|f| f.factor.clone()).collect()
    }
}
