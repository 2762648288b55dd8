use serde::{Deserialize, Serialize};

/// One ad's aggregated performance for the analysis window.
///
/// Field names mirror the upstream warehouse/fixture export, so the capitalized
/// aliases are part of the wire contract. Records are immutable once loaded;
/// the pipeline only ever reads them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(default)]
    pub ad_name: String,
    #[serde(default)]
    pub ad_id: String,
    #[serde(default)]
    pub ad_provider: String,
    #[serde(default)]
    pub store: String,
    #[serde(default)]
    pub ad_type: String,

    // Volume
    #[serde(rename = "Spend", default)]
    pub spend: f64,
    #[serde(default)]
    pub total_impressions: u64,
    #[serde(default)]
    pub total_clicks: u64,
    #[serde(rename = "Purchases", default)]
    pub purchases: f64,
    #[serde(rename = "Conversion_Value", default)]
    pub conversion_value: f64,

    // Efficiency
    #[serde(rename = "CPA", default)]
    pub cpa: f64,
    #[serde(rename = "ROAS", default)]
    pub roas: f64,
    #[serde(rename = "CTR", default)]
    pub ctr: f64,
    #[serde(rename = "CVR", default)]
    pub cvr: f64,

    // Pre-computed standardized scores (present when the warehouse already
    // ran the log-domain standardization)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_cpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_roas: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_ctr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_cvr: Option<f64>,

    // Lifecycle
    #[serde(default)]
    pub days_active: i64,
    #[serde(default)]
    pub creative_variants: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recency: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_utilization: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_engagement_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_pressure: Option<f64>,
}

impl MetricRecord {
    /// Stable identity used for de-duplication and merge-by-key. Falls back
    /// to the ad name when the warehouse id is missing.
    pub fn identity(&self) -> &str {
        if self.ad_id.is_empty() { &self.ad_name } else { &self.ad_id }
    }

    pub fn is_creative_fatigued(&self) -> bool {
        self.creative_status.as_deref() == Some("fatigued")
    }
}

/// Metric selector for detection. Standardized variants read the `z_*`
/// fields directly instead of deriving a score from raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Spend,
    Cpa,
    Roas,
    Ctr,
    Cvr,
    ZCpa,
    ZRoas,
    ZCtr,
    ZCvr,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Spend => "spend",
            Metric::Cpa => "cpa",
            Metric::Roas => "roas",
            Metric::Ctr => "ctr",
            Metric::Cvr => "cvr",
            Metric::ZCpa => "z_cpa",
            Metric::ZRoas => "z_roas",
            Metric::ZCtr => "z_ctr",
            Metric::ZCvr => "z_cvr",
        }
    }

    pub fn is_standardized(&self) -> bool {
        matches!(self, Metric::ZCpa | Metric::ZRoas | Metric::ZCtr | Metric::ZCvr)
    }

    /// The raw metric a standardized score was derived from.
    pub fn raw(&self) -> Metric {
        match self {
            Metric::ZCpa => Metric::Cpa,
            Metric::ZRoas => Metric::Roas,
            Metric::ZCtr => Metric::Ctr,
            Metric::ZCvr => Metric::Cvr,
            other => *other,
        }
    }

    /// Observed raw value for this metric. Standardized variants resolve to
    /// their underlying raw field.
    pub fn value_of(&self, record: &MetricRecord) -> f64 {
        match self.raw() {
            Metric::Spend => record.spend,
            Metric::Cpa => record.cpa,
            Metric::Roas => record.roas,
            Metric::Ctr => record.ctr,
            Metric::Cvr => record.cvr,
            // raw() never returns a standardized variant
            _ => 0.0,
        }
    }

    /// Pre-computed standardized score, when present on the record.
    pub fn score_of(&self, record: &MetricRecord) -> Option<f64> {
        match self {
            Metric::ZCpa => record.z_cpa,
            Metric::ZRoas => record.z_roas,
            Metric::ZCtr => record.z_ctr,
            Metric::ZCvr => record.z_cvr,
            _ => None,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
