//! Root-cause analysis for flagged ads.
//!
//! Factor thresholds are data-driven per account: each percentile factor is
//! compared against the 25th/75th percentile of the same field across the
//! whole input collection, so the logic holds for accounts with very
//! different baselines. Binary lifecycle factors (single creative, fatigue,
//! learning phase) are evaluated independently.

use std::collections::BTreeMap;

use crate::config::RcaConfig;
use crate::models::{
    Anomaly, Impact, ImpactSummary, MetricRecord, RootCauseFinding, RootCauseReport,
};
use crate::utils::stats;

const COMPARISON_DIMENSIONS: [&str; 3] = ["ad_provider", "store", "ad_type"];

const FALLBACK_ACTION: &str =
    "Anomaly detected but no clear root cause identified. Manual review recommended.";

pub struct RootCauseAnalyzer {
    config: RcaConfig,
}

impl RootCauseAnalyzer {
    pub fn new(config: RcaConfig) -> Self {
        Self { config }
    }

    /// Analyze one anomalous record against the full collection.
    ///
    /// Pure and order-independent: percentiles are computed over value
    /// content only.
    pub fn analyze(&self, anomaly: &Anomaly, all_records: &[MetricRecord]) -> RootCauseReport {
        let record = &anomaly.record;
        let mut findings: Vec<RootCauseFinding> = Vec::new();

        // Percentile-driven factors
        if let Some(finding) = self.check_low_percentile(
            record.audience_engagement_score,
            all_records.iter().filter_map(|r| r.audience_engagement_score),
            "audience_engagement",
            Impact::High,
            "Review audience targeting settings",
            |value, p25| {
                format!(
                    "Audience engagement score ({:.1}) is below the 25th percentile ({:.1})",
                    value, p25
                )
            },
        ) {
            findings.push(finding);
        }

        if let Some(finding) = self.check_high_percentile(
            record.competitive_pressure,
            all_records.iter().filter_map(|r| r.competitive_pressure),
            "competitive_pressure",
            Impact::Medium,
            "Consider different placements or dayparting",
            |value, p75| {
                format!(
                    "Competitive pressure ({:.1}) is above the 75th percentile ({:.1})",
                    value, p75
                )
            },
        ) {
            findings.push(finding);
        }

        if let Some(finding) = self.check_low_percentile(
            Some(record.ctr),
            all_records.iter().map(|r| r.ctr),
            "low_ctr",
            Impact::High,
            "Improve ad copy, creative, or targeting to increase click-through rate",
            |value, p25| {
                format!("CTR ({:.2}%) is below the 25th percentile ({:.2}%)", value, p25)
            },
        ) {
            findings.push(finding);
        }

        if let Some(finding) = self.check_high_percentile(
            record.budget_utilization,
            all_records.iter().filter_map(|r| r.budget_utilization),
            "budget_utilization",
            Impact::Medium,
            "Review pacing settings and budget caps",
            |value, p75| {
                format!(
                    "Budget utilization ({:.2}) is above the 75th percentile ({:.2})",
                    value, p75
                )
            },
        ) {
            findings.push(finding);
        }

        // Binary lifecycle factors
        if record.creative_variants == 1 {
            findings.push(RootCauseFinding {
                factor: "single_creative_variant".to_string(),
                finding: "Only 1 creative variant is running for this ad".to_string(),
                impact: Impact::Medium,
                suggestion: "Test 2-3 creative variants".to_string(),
            });
        }

        if record.is_creative_fatigued() {
            findings.push(RootCauseFinding {
                factor: "creative_fatigue".to_string(),
                finding: format!(
                    "Creative is marked fatigued after {} days active",
                    record.days_active
                ),
                impact: Impact::High,
                suggestion: "Refresh creative assets immediately".to_string(),
            });
        }

        if record.days_active < self.config.learning_phase_days {
            findings.push(RootCauseFinding {
                factor: "learning_phase".to_string(),
                finding: format!(
                    "Ad has only been active {} of {} learning-phase days",
                    record.days_active, self.config.learning_phase_days
                ),
                impact: Impact::Low,
                suggestion: "Allow more time for optimization before making changes".to_string(),
            });
        }

        let comparison_to_similar = compare_to_similar(anomaly, all_records);
        let recommended_actions = recommended_actions(&findings);
        let impact_summary = summarize_impact(&findings);

        RootCauseReport {
            anomaly_summary: format!(
                "{}: {} = {:.2} (score {:.2}, {} severity)",
                record.ad_name,
                anomaly.metric,
                anomaly.value,
                anomaly.score,
                anomaly.severity.as_str()
            ),
            root_causes: findings,
            comparison_to_similar,
            recommended_actions,
            impact_summary,
        }
    }

    fn check_low_percentile(
        &self,
        observed: Option<f64>,
        population: impl Iterator<Item = f64>,
        factor: &str,
        impact: Impact,
        suggestion: &str,
        describe: impl Fn(f64, f64) -> String,
    ) -> Option<RootCauseFinding> {
        let value = observed?;
        let pool: Vec<f64> = population.collect();
        let p25 = stats::percentile(&pool, 25.0)?;
        (value < p25).then(|| RootCauseFinding {
            factor: factor.to_string(),
            finding: describe(value, p25),
            impact,
            suggestion: suggestion.to_string(),
        })
    }

    fn check_high_percentile(
        &self,
        observed: Option<f64>,
        population: impl Iterator<Item = f64>,
        factor: &str,
        impact: Impact,
        suggestion: &str,
        describe: impl Fn(f64, f64) -> String,
    ) -> Option<RootCauseFinding> {
        let value = observed?;
        let pool: Vec<f64> = population.collect();
        let p75 = stats::percentile(&pool, 75.0)?;
        (value > p75).then(|| RootCauseFinding {
            factor: factor.to_string(),
            finding: describe(value, p75),
            impact,
            suggestion: suggestion.to_string(),
        })
    }
}

/// Mean of the anomaly metric among other records sharing each grouping
/// dimension value, keyed `same_<dimension>_avg_<metric>` plus a peer count.
fn compare_to_similar(anomaly: &Anomaly, all_records: &[MetricRecord]) -> BTreeMap<String, f64> {
    let mut comparison = BTreeMap::new();
    let record = &anomaly.record;
    let metric = anomaly.metric;

    for dim in COMPARISON_DIMENSIONS {
        let own = dimension_value(record, dim);
        if own.is_empty() {
            continue;
        }
        let peers: Vec<f64> = all_records
            .iter()
            .filter(|r| r.identity() != record.identity() && dimension_value(r, dim) == own)
            .map(|r| metric.value_of(r))
            .collect();
        if let Some(avg) = stats::mean(&peers) {
            comparison
                .insert(format!("same_{}_avg_{}", dim, metric.raw()), stats::round2(avg));
            comparison.insert(format!("same_{}_count", dim), peers.len() as f64);
        }
    }

    comparison
}

fn dimension_value<'a>(record: &'a MetricRecord, dim: &str) -> &'a str {
    match dim {
        "ad_provider" => &record.ad_provider,
        "store" => &record.store,
        "ad_type" => &record.ad_type,
        _ => "",
    }
}

/// High-impact suggestions first, then medium, de-duplicated. Never empty.
fn recommended_actions(findings: &[RootCauseFinding]) -> Vec<String> {
    let mut actions: Vec<String> = Vec::new();
    for impact in [Impact::High, Impact::Medium] {
        for finding in findings.iter().filter(|f| f.impact == impact) {
            if !actions.contains(&finding.suggestion) {
                actions.push(finding.suggestion.clone());
            }
        }
    }
    if actions.is_empty() {
        actions.push(FALLBACK_ACTION.to_string());
    }
    actions
}

fn summarize_impact(findings: &[RootCauseFinding]) -> ImpactSummary {
    ImpactSummary {
        high_impact_factors: findings.iter().filter(|f| f.impact == Impact::High).count(),
        medium_impact_factors: findings.iter().filter(|f| f.impact == Impact::Medium).count(),
        low_impact_factors: findings.iter().filter(|f| f.impact == Impact::Low).count(),
    }
}
