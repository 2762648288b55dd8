//! Budget action recommendations.
//!
//! Cost-side anomalies map to actions by statistical severity; return-side
//! anomalies map by absolute ROAS against fixed cut points (ROAS has an
//! economically meaningful zero, unlike CPA). Two opportunity scans cover the
//! non-anomalous remainder: scaling proven winners and refreshing stale
//! creative.

use std::collections::HashSet;

use crate::config::RecommendConfig;
use crate::models::{
    Action, Anomaly, Direction, Metric, Priority, Recommendation, RecommendationSummary,
    ReasoningSource, RootCauseReport, Severity,
};

/// One anomaly paired with its root-cause report; the engine's unit of input.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalyzedAnomaly {
    pub anomaly: Anomaly,
    pub root_causes: RootCauseReport,
}

/// Engine output: prioritized actions plus an aggregate summary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecommendationReport {
    pub recommendations: Vec<Recommendation>,
    pub summary: RecommendationSummary,
}

pub struct RecommendationEngine {
    config: RecommendConfig,
}

impl RecommendationEngine {
    pub fn new(config: RecommendConfig) -> Self {
        Self { config }
    }

    /// Build the full prioritized action list: anomaly-driven actions first,
    /// then scaling and creative-refresh opportunities over the remainder.
    pub fn recommend(
        &self,
        cases: &[AnalyzedAnomaly],
        all_records: &[crate::models::MetricRecord],
    ) -> RecommendationReport {
        let mut recommendations: Vec<Recommendation> = Vec::new();

        for case in cases {
            if let Some(rec) = self.recommend_for_anomaly(case) {
                recommendations.push(rec);
            }
        }

        let flagged: HashSet<&str> =
            cases.iter().map(|c| c.anomaly.record.identity()).collect();
        recommendations.extend(self.scan_for_opportunities(all_records, &flagged));

        // Priority tier first, then magnitude of impact. Stable so equal
        // entries keep their scan order.
        recommendations.sort_by(|a, b| {
            a.priority.rank().cmp(&b.priority.rank()).then(
                b.estimated_impact
                    .abs()
                    .partial_cmp(&a.estimated_impact.abs())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        let summary = summarize(&recommendations);
        RecommendationReport { recommendations, summary }
    }

    /// Map one analyzed anomaly to an action. Anomalies on metrics the engine
    /// has no mapping for are skipped silently, never fatal.
    fn recommend_for_anomaly(&self, case: &AnalyzedAnomaly) -> Option<Recommendation> {
        let anomaly = &case.anomaly;
        match (anomaly.metric.raw(), anomaly.direction) {
            (Metric::Cpa, Direction::High) => Some(self.high_cpa_action(case)),
            (Metric::Roas, Direction::Low) => Some(self.low_roas_action(case)),
            _ => {
                tracing::debug!(
                    metric = %anomaly.metric,
                    ad = %anomaly.record.ad_name,
                    "no action mapping for anomaly, skipping"
                );
                None
            },
        }
    }

    fn high_cpa_action(&self, case: &AnalyzedAnomaly) -> Recommendation {
        let anomaly = &case.anomaly;
        let score_abs = anomaly.score.abs();

        let (action, pct, priority, template) =
            if anomaly.severity >= Severity::Extreme || score_abs >= 2.5 {
                (
                    Action::Pause,
                    100,
                    Priority::Critical,
                    format!(
                        "CPA is extremely high (score {:.1}). Pausing to stop budget waste.",
                        anomaly.score
                    ),
                )
            } else if anomaly.severity >= Severity::Significant || score_abs >= 1.5 {
                (
                    Action::Reduce,
                    50,
                    Priority::High,
                    format!(
                        "CPA is significantly elevated (score {:.1}). Reducing budget while investigating.",
                        anomaly.score
                    ),
                )
            } else {
                (
                    Action::Reduce,
                    25,
                    Priority::Medium,
                    format!(
                        "CPA is mildly elevated (score {:.1}). Trimming budget as a precaution.",
                        anomaly.score
                    ),
                )
            };

        self.build_spend_action(case, action, pct, priority, template, confidence(score_abs))
    }

    fn low_roas_action(&self, case: &AnalyzedAnomaly) -> Recommendation {
        let anomaly = &case.anomaly;
        let roas = anomaly.record.roas;

        let (action, pct, priority, template) = if roas < self.config.pause_max_roas {
            (
                Action::Pause,
                100,
                Priority::Critical,
                format!("ROAS ({:.2}) is below breakeven threshold. Pausing to stop losses.", roas),
            )
        } else if roas < self.config.reduce_max_roas {
            (
                Action::Reduce,
                50,
                Priority::High,
                format!("ROAS ({:.2}) is well below target. Reducing budget.", roas),
            )
        } else {
            (
                Action::Reduce,
                25,
                Priority::Medium,
                format!("ROAS ({:.2}) is anomalously low for this account. Trimming budget.", roas),
            )
        };

        self.build_spend_action(
            case,
            action,
            pct,
            priority,
            template,
            confidence(anomaly.score.abs()),
        )
    }

    /// Shared assembly for cost/return actions. Impact is the spend fraction
    /// being cut, interpreted as savings; magnitude, proposed spend, and
    /// impact all derive from the same inputs.
    fn build_spend_action(
        &self,
        case: &AnalyzedAnomaly,
        action: Action,
        magnitude_pct: u32,
        priority: Priority,
        template: String,
        confidence: f64,
    ) -> Recommendation {
        let record = &case.anomaly.record;
        let change_pct = -(magnitude_pct as i32);
        let estimated_impact = record.spend * f64::from(magnitude_pct) / 100.0;

        Recommendation {
            action,
            ad_name: record.ad_name.clone(),
            ad_id: record.ad_id.clone(),
            provider: record.ad_provider.clone(),
            current_spend: record.spend,
            proposed_spend: record.spend * (1.0 + f64::from(change_pct) / 100.0),
            change_pct,
            reasoning: attach_findings(template, &case.root_causes),
            estimated_impact,
            priority,
            confidence,
            reasoning_source: ReasoningSource::TemplateFallback,
            root_causes: case.root_causes.top_factors(3),
        }
    }

    /// Opportunity scans over records not already flagged as anomalous.
    pub fn scan_for_opportunities(
        &self,
        all_records: &[crate::models::MetricRecord],
        flagged: &HashSet<&str>,
    ) -> Vec<Recommendation> {
        let candidates: Vec<&crate::models::MetricRecord> =
            all_records.iter().filter(|r| !flagged.contains(r.identity())).collect();

        let mut out = self.scaling_scan(&candidates);
        out.extend(self.creative_refresh_scan(&candidates));
        out
    }

    /// Proven winners: high return, stable cost score, meaningful spend.
    /// Magnitude ramps continuously with demonstrated return, capped at 100%.
    fn scaling_scan(&self, candidates: &[&crate::models::MetricRecord]) -> Vec<Recommendation> {
        let mut recs: Vec<Recommendation> = candidates
            .iter()
            .filter(|r| {
                r.spend >= self.config.scale_min_spend
                    && r.roas >= self.config.scale_min_roas
                    && r.z_cpa.unwrap_or(0.0) <= self.config.scale_max_cpa_z
            })
            .map(|r| {
                let pct = ((r.roas / self.config.scale_min_roas) * 30.0) as i32;
                let pct = pct.min(100);
                let additional_spend = r.spend * f64::from(pct) / 100.0;
                let estimated_revenue = additional_spend * r.roas;
                let priority = if r.roas >= 5.0 { Priority::High } else { Priority::Medium };

                Recommendation {
                    action: Action::Scale,
                    ad_name: r.ad_name.clone(),
                    ad_id: r.ad_id.clone(),
                    provider: r.ad_provider.clone(),
                    current_spend: r.spend,
                    proposed_spend: r.spend * (1.0 + f64::from(pct) / 100.0),
                    change_pct: pct,
                    reasoning: format!(
                        "ROAS of {:.1} with stable CPA indicates headroom to scale. A +{}% budget could add ~${:.0} in revenue.",
                        r.roas, pct, estimated_revenue
                    ),
                    estimated_impact: estimated_revenue,
                    priority,
                    confidence: (0.4 + r.roas / 10.0).min(0.85),
                    reasoning_source: ReasoningSource::TemplateFallback,
                    root_causes: vec![],
                }
            })
            .collect();

        recs.sort_by(|a, b| {
            b.estimated_impact
                .partial_cmp(&a.estimated_impact)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recs.truncate(self.config.top_opportunities);
        recs
    }

    /// Stale creative: one variant, explicit fatigue, or long-running with a
    /// single variant. Impact is a fixed 15% improvement heuristic and the
    /// confidence a conservative constant; neither is statistically derived.
    fn creative_refresh_scan(
        &self,
        candidates: &[&crate::models::MetricRecord],
    ) -> Vec<Recommendation> {
        let mut recs: Vec<Recommendation> = candidates
            .iter()
            .filter(|r| r.spend >= self.config.scale_min_spend)
            .filter(|r| {
                r.creative_variants <= 1
                    || r.is_creative_fatigued()
                    || (r.days_active >= self.config.refresh_min_days_active
                        && r.creative_variants == 1)
            })
            .map(|r| Recommendation {
                action: Action::RefreshCreative,
                ad_name: r.ad_name.clone(),
                ad_id: r.ad_id.clone(),
                provider: r.ad_provider.clone(),
                current_spend: r.spend,
                proposed_spend: r.spend,
                change_pct: 0,
                reasoning: format!(
                    "Creative is stale ({} variant(s), {} days active). Refreshing could improve performance by ~15%.",
                    r.creative_variants, r.days_active
                ),
                estimated_impact: r.spend * 0.15,
                priority: Priority::Medium,
                confidence: 0.7,
                reasoning_source: ReasoningSource::TemplateFallback,
                root_causes: vec![],
            })
            .collect();

        recs.sort_by(|a, b| {
            b.current_spend
                .partial_cmp(&a.current_spend)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recs.truncate(self.config.top_opportunities);
        recs
    }
}

/// Monotonically increasing in score magnitude, capped at 0.9.
fn confidence(score_abs: f64) -> f64 {
    (0.5 + score_abs * 0.15).min(0.9)
}

/// Append the strongest root-cause findings to the template text, truncated
/// so reasoning stays one readable line per finding.
fn attach_findings(template: String, report: &RootCauseReport) -> String {
    let snippets: Vec<String> = report
        .root_causes
        .iter()
        .filter(|f| f.impact >= crate::models::Impact::Medium)
        .take(2)
        .map(|f| truncate(&f.finding, 60))
        .collect();

    if snippets.is_empty() {
        template
    } else {
        format!("{} Root causes: {}", template, snippets.join("; "))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { s.to_string() } else { s.chars().take(max).collect() }
}

fn summarize(recommendations: &[Recommendation]) -> RecommendationSummary {
    let mut summary = RecommendationSummary { total: recommendations.len(), ..Default::default() };

    for rec in recommendations {
        *summary.by_action.entry(rec.action.as_str().to_string()).or_default() += 1;
        *summary.by_priority.entry(rec.priority.as_str().to_string()).or_default() += 1;
        match rec.action {
            Action::Pause | Action::Reduce => summary.total_potential_savings += rec.estimated_impact,
            Action::Scale | Action::RefreshCreative => {
                summary.total_potential_revenue += rec.estimated_impact
            },
            Action::Unknown => {},
        }
    }

    summary.net_impact = summary.total_potential_savings + summary.total_potential_revenue;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImpactSummary, MetricRecord};
    use std::collections::BTreeMap;

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(RecommendConfig::default())
    }

    fn empty_report() -> RootCauseReport {
        RootCauseReport {
            anomaly_summary: String::new(),
            root_causes: vec![],
            comparison_to_similar: BTreeMap::new(),
            recommended_actions: vec![],
            impact_summary: ImpactSummary::default(),
        }
    }

    fn case(metric: Metric, direction: Direction, severity: Severity, score: f64, record: MetricRecord) -> AnalyzedAnomaly {
        AnalyzedAnomaly {
            anomaly: Anomaly {
                value: metric.value_of(&record),
                record,
                metric,
                baseline: None,
                score,
                direction,
                severity,
            },
            root_causes: empty_report(),
        }
    }

    fn record(name: &str, spend: f64) -> MetricRecord {
        MetricRecord {
            ad_name: name.to_string(),
            ad_id: name.to_string(),
            ad_provider: "meta".to_string(),
            spend,
            creative_variants: 3,
            days_active: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_extreme_high_cpa_pauses_full_spend() {
        let r = record("waster", 1000.0);
        let cases = vec![case(Metric::ZCpa, Direction::High, Severity::Extreme, 3.4, r)];
        let report = engine().recommend(&cases, &[]);

        assert_eq!(report.recommendations.len(), 1);
        let rec = &report.recommendations[0];
        assert_eq!(rec.action, Action::Pause);
        assert_eq!(rec.change_pct, -100);
        assert_eq!(rec.estimated_impact, 1000.0);
        assert_eq!(rec.proposed_spend, 0.0);
        assert_eq!(rec.priority, Priority::Critical);
    }

    #[test]
    fn test_significant_cpa_reduces_half() {
        let r = record("pricey", 800.0);
        let cases = vec![case(Metric::ZCpa, Direction::High, Severity::Significant, 2.2, r)];
        let report = engine().recommend(&cases, &[]);
        let rec = &report.recommendations[0];
        assert_eq!(rec.action, Action::Reduce);
        assert_eq!(rec.change_pct, -50);
        assert_eq!(rec.estimated_impact, 400.0);
        assert_eq!(rec.proposed_spend, 400.0);
    }

    #[test]
    fn test_low_roas_below_pause_cut() {
        let mut r = record("loser", 500.0);
        r.roas = 0.3;
        let cases = vec![case(Metric::ZRoas, Direction::Low, Severity::Significant, -2.1, r)];
        let report = engine().recommend(&cases, &[]);
        let rec = &report.recommendations[0];
        assert_eq!(rec.action, Action::Pause);
        assert_eq!(rec.priority, Priority::Critical);
        assert_eq!(rec.estimated_impact, 500.0);
    }

    #[test]
    fn test_low_roas_between_cuts_reduces() {
        let mut r = record("meh", 400.0);
        r.roas = 1.0;
        let cases = vec![case(Metric::ZRoas, Direction::Low, Severity::Mild, -1.6, r)];
        let report = engine().recommend(&cases, &[]);
        let rec = &report.recommendations[0];
        assert_eq!(rec.action, Action::Reduce);
        assert_eq!(rec.change_pct, -50);
    }

    #[test]
    fn test_confidence_monotonic_and_capped() {
        assert_eq!(confidence(0.0), 0.5);
        assert!((confidence(2.0) - 0.8).abs() < 1e-9);
        assert_eq!(confidence(10.0), 0.9);
    }

    #[test]
    fn test_unmapped_metric_skipped_silently() {
        let r = record("spendy", 900.0);
        let cases = vec![case(Metric::Spend, Direction::High, Severity::Extreme, 4.0, r)];
        let report = engine().recommend(&cases, &[]);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.summary.total, 0);
    }

    #[test]
    fn test_scaling_scan_ramp_and_cap() {
        let mut winner = record("winner", 1000.0);
        winner.roas = 6.0;
        winner.z_cpa = Some(0.1);
        let mut moon = record("moon", 500.0);
        moon.roas = 12.0;
        moon.z_cpa = Some(-0.5);

        let recs = engine().scan_for_opportunities(&[winner, moon], &HashSet::new());
        let winner_rec = recs.iter().find(|r| r.ad_name == "winner").unwrap();
        // 6.0 / 3.0 * 30 = 60
        assert_eq!(winner_rec.change_pct, 60);
        assert_eq!(winner_rec.estimated_impact, 600.0 * 6.0);
        assert_eq!(winner_rec.priority, Priority::High);

        let moon_rec = recs.iter().find(|r| r.ad_name == "moon").unwrap();
        assert_eq!(moon_rec.change_pct, 100, "ramp caps at 100%");
        assert!(moon_rec.confidence <= 0.85);
    }

    #[test]
    fn test_scaling_scan_excludes_flagged_and_unstable() {
        let mut flagged_rec = record("flagged", 1000.0);
        flagged_rec.roas = 8.0;
        let mut unstable = record("unstable", 1000.0);
        unstable.roas = 8.0;
        unstable.z_cpa = Some(1.2);

        let mut flagged = HashSet::new();
        flagged.insert("flagged");
        let recs = engine().scan_for_opportunities(&[flagged_rec, unstable], &flagged);
        assert!(recs.iter().all(|r| r.action != Action::Scale));
    }

    #[test]
    fn test_refresh_scan_flags_stale_creative() {
        let mut single = record("single", 300.0);
        single.creative_variants = 1;
        single.days_active = 5;
        let mut fatigued = record("fatigued", 200.0);
        fatigued.creative_variants = 4;
        fatigued.creative_status = Some("fatigued".to_string());
        let mut fresh = record("fresh", 250.0);
        fresh.creative_variants = 3;
        fresh.days_active = 10;

        let recs = engine().scan_for_opportunities(&[single, fatigued, fresh], &HashSet::new());
        let refresh: Vec<&Recommendation> =
            recs.iter().filter(|r| r.action == Action::RefreshCreative).collect();
        assert_eq!(refresh.len(), 2);
        // sorted by spend descending
        assert_eq!(refresh[0].ad_name, "single");
        assert_eq!(refresh[0].estimated_impact, 45.0);
        assert_eq!(refresh[0].confidence, 0.7);
        assert_eq!(refresh[1].ad_name, "fatigued");
    }

    #[test]
    fn test_final_ordering_priority_then_impact() {
        let mut small_loser = record("small_loser", 100.0);
        small_loser.roas = 0.2;
        let big = record("big_waster", 5000.0);
        let cases = vec![
            case(Metric::ZRoas, Direction::Low, Severity::Significant, -2.0, small_loser),
            case(Metric::ZCpa, Direction::High, Severity::Extreme, 3.2, big),
        ];
        let mut winner = record("winner", 1000.0);
        winner.roas = 6.0;

        let report = engine().recommend(&cases, &[winner]);
        let names: Vec<&str> =
            report.recommendations.iter().map(|r| r.ad_name.as_str()).collect();
        // both criticals first (bigger impact first), then the high-priority scale
        assert_eq!(names, vec!["big_waster", "small_loser", "winner"]);
    }

    #[test]
    fn test_summary_counts_and_net_impact() {
        let big = record("big_waster", 2000.0);
        let cases = vec![case(Metric::ZCpa, Direction::High, Severity::Extreme, 3.0, big)];
        let mut winner = record("winner", 1000.0);
        winner.roas = 6.0;

        let report = engine().recommend(&cases, &[winner]);
        assert_eq!(report.summary.total, report.recommendations.len());
        assert_eq!(report.summary.by_action.get("pause"), Some(&1));
        assert_eq!(report.summary.by_action.get("scale"), Some(&1));
        assert_eq!(report.summary.total_potential_savings, 2000.0);
        assert_eq!(report.summary.total_potential_revenue, 3600.0);
        assert_eq!(report.summary.net_impact, 5600.0);
    }

    #[test]
    fn test_reasoning_cites_top_findings() {
        use crate::models::{Impact, RootCauseFinding};
        let mut report = empty_report();
        report.root_causes.push(RootCauseFinding {
            factor: "creative_fatigue".into(),
            finding: "Creative is marked fatigued after 40 days active".into(),
            impact: Impact::High,
            suggestion: "Refresh creative assets immediately".into(),
        });
        let mut c = case(
            Metric::ZCpa,
            Direction::High,
            Severity::Significant,
            2.1,
            record("tired", 600.0),
        );
        c.root_causes = report;

        let out = engine().recommend(&[c], &[]);
        let rec = &out.recommendations[0];
        assert!(rec.reasoning.contains("Root causes:"));
        assert!(rec.reasoning.contains("fatigued"));
        assert_eq!(rec.root_causes, vec!["creative_fatigue"]);
        assert_eq!(rec.reasoning_source, ReasoningSource::TemplateFallback);
    }
}
