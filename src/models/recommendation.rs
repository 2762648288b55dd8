use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Budget action emitted by the recommendation engine. Unknown values
/// deserialize to `Unknown` so a newer upstream cannot break batch execution;
/// the processor skips them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Scale,
    Reduce,
    Pause,
    RefreshCreative,
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Scale => "scale",
            Action::Reduce => "reduce",
            Action::Pause => "pause",
            Action::RefreshCreative => "refresh_creative",
            Action::Unknown => "unknown",
        }
    }
}

/// Priority tier. `rank` gives the sort key (critical first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// Where the reasoning text came from. Enrichment may upgrade this to
/// `LlmEnriched` only after the text passes grounding validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningSource {
    TemplateFallback,
    LlmEnriched,
}

/// One prioritized budget action.
///
/// Numeric fields are fixed at creation; only `reasoning` and
/// `reasoning_source` may be rewritten afterwards (by validated enrichment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub ad_name: String,
    pub ad_id: String,
    pub provider: String,
    pub current_spend: f64,
    pub proposed_spend: f64,
    /// Signed percentage applied to `current_spend` (-100 for pause, 0 for
    /// creative refresh).
    pub change_pct: i32,
    pub reasoning: String,
    /// Signed dollar estimate: positive means savings or revenue gain.
    pub estimated_impact: f64,
    pub priority: Priority,
    pub confidence: f64,
    pub reasoning_source: ReasoningSource,
    #[serde(default)]
    pub root_causes: Vec<String>,
}

impl Recommendation {
    /// Spend after applying `change_pct`. Also the value stored in
    /// `proposed_spend`; recomputable so the two can be cross-checked.
    pub fn derived_proposed_spend(&self) -> f64 {
        self.current_spend * (1.0 + f64::from(self.change_pct) / 100.0)
    }
}

/// Aggregate view over an emitted recommendation list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationSummary {
    pub total: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub total_potential_savings: f64,
    pub total_potential_revenue: f64,
    pub net_impact: f64,
}
