//! End-to-end analysis pipeline.
//!
//! One `run_analysis` call takes the raw record collection through
//! standardization, detection on three metric/direction pairs, root-cause
//! analysis of the top anomalies, recommendation generation, and optional
//! reasoning enrichment. Stages are pure given their inputs; the pipeline
//! only wires them together and instruments the seams.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::breakdown::{breakdown_by, DimensionBreakdown};
use super::detector::AnomalyDetector;
use super::llm::{LlmClient, ReasoningEnricher};
use super::recommend::{AnalyzedAnomaly, RecommendationEngine, RecommendationReport};
use super::root_cause::RootCauseAnalyzer;
use crate::config::Config;
use crate::models::{DetectionReport, Direction, Metric, MetricRecord};
use crate::observability::Tracer;
use crate::utils::round2;

/// Metric/direction pairs scanned on every run. CPA trouble shows up high,
/// ROAS trouble shows up low, runaway spend shows up high on the raw value.
const DETECTION_PASSES: [(Metric, Direction); 3] = [
    (Metric::ZCpa, Direction::High),
    (Metric::ZRoas, Direction::Low),
    (Metric::Spend, Direction::High),
];

const BREAKDOWN_DIMENSIONS: [&str; 3] = ["ad_provider", "store", "ad_type"];

/// One detection pass's output, labeled with what was scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionPass {
    pub metric: Metric,
    pub direction: Direction,
    pub report: DetectionReport,
}

/// Account-level rollup attached to every analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSummary {
    pub anomalies_by_metric: BTreeMap<String, usize>,
    pub total_anomalous_spend: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_provider: Option<String>,
    pub breakdowns: Vec<DimensionBreakdown>,
}

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub detections: Vec<DetectionPass>,
    pub cases: Vec<AnalyzedAnomaly>,
    pub recommendations: RecommendationReport,
    pub account_summary: AccountSummary,
}

pub struct PipelineService {
    config: Config,
    detector: AnomalyDetector,
    analyzer: RootCauseAnalyzer,
    engine: RecommendationEngine,
    enricher: ReasoningEnricher,
    tracer: Arc<dyn Tracer>,
}

impl PipelineService {
    pub fn new(config: Config, llm_client: Arc<dyn LlmClient>, tracer: Arc<dyn Tracer>) -> Self {
        let detector = AnomalyDetector::new(config.detector.clone());
        let analyzer = RootCauseAnalyzer::new(config.rca.clone());
        let engine = RecommendationEngine::new(config.recommend.clone());
        let enricher = ReasoningEnricher::new(llm_client, config.llm.clone());
        Self { config, detector, analyzer, engine, enricher, tracer }
    }

    /// Validate configuration and report readiness. Must be called once
    /// before the first `run_analysis`.
    pub async fn init(&self) -> Result<(), anyhow::Error> {
        self.config.validate()?;
        tracing::info!(
            threshold_sigma = self.config.detector.threshold_sigma,
            min_spend = self.config.detector.min_spend,
            llm_enabled = self.config.llm.enabled,
            "pipeline initialized"
        );
        Ok(())
    }

    /// Flush-and-stop hook. The pipeline owns no background work today, so
    /// this only marks the lifecycle boundary in the log.
    pub async fn shutdown(&self) {
        tracing::info!("pipeline shut down");
    }

    pub async fn run_analysis(&self, records: &[MetricRecord]) -> AnalysisReport {
        let mut span = self.tracer.start("run_analysis");
        span.set_attribute("records", records.len().to_string());

        // Standardize once if the warehouse didn't; a single populated score
        // means the whole batch was pre-standardized.
        let records: Vec<MetricRecord> = if records.iter().any(|r| r.z_cpa.is_some()) {
            records.to_vec()
        } else {
            self.detector.standardize_log_domain(records)
        };

        let detections = self.detect_all(&records);
        let cases = self.analyze_top_anomalies(&detections, &records);
        span.set_attribute("cases", cases.len().to_string());

        let mut report = self.engine.recommend(&cases, &records);
        self.enricher.enrich(&mut report.recommendations).await;

        let account_summary = self.summarize_account(&detections, &records);

        tracing::info!(
            records = records.len(),
            anomalies = detections.iter().map(|d| d.report.anomalies.len()).sum::<usize>(),
            recommendations = report.recommendations.len(),
            "analysis complete"
        );
        span.end();

        AnalysisReport {
            generated_at: Utc::now(),
            record_count: records.len(),
            detections,
            cases,
            recommendations: report,
            account_summary,
        }
    }

    fn detect_all(&self, records: &[MetricRecord]) -> Vec<DetectionPass> {
        DETECTION_PASSES
            .iter()
            .map(|&(metric, direction)| {
                let mut span = self.tracer.start("detect");
                span.set_attribute("metric", metric.to_string());
                let report = self.detector.detect(records, metric, direction);
                if let Some(warning) = &report.warning {
                    tracing::warn!(metric = %metric, warning, "detection pass degraded");
                }
                span.set_attribute("anomalies", report.anomalies.len().to_string());
                span.end();
                DetectionPass { metric, direction, report }
            })
            .collect()
    }

    /// Root-cause the top N anomalies of each pass, deduplicating ads that
    /// were flagged by more than one metric. First pass wins the dedup; passes
    /// are already sorted by score magnitude.
    fn analyze_top_anomalies(
        &self,
        detections: &[DetectionPass],
        records: &[MetricRecord],
    ) -> Vec<AnalyzedAnomaly> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut cases: Vec<AnalyzedAnomaly> = Vec::new();

        for pass in detections {
            for anomaly in pass.report.anomalies.iter().take(self.config.rca.top_anomalies) {
                if !seen.insert(anomaly.record.identity().to_string()) {
                    continue;
                }
                let root_causes = self.analyzer.analyze(anomaly, records);
                cases.push(AnalyzedAnomaly { anomaly: anomaly.clone(), root_causes });
            }
        }

        cases
    }

    fn summarize_account(
        &self,
        detections: &[DetectionPass],
        records: &[MetricRecord],
    ) -> AccountSummary {
        let mut anomalies_by_metric: BTreeMap<String, usize> = BTreeMap::new();
        let mut anomalous: BTreeMap<&str, f64> = BTreeMap::new();
        let mut spend_by_provider: BTreeMap<&str, f64> = BTreeMap::new();

        for pass in detections {
            let count = pass.report.anomalies.len();
            if count > 0 {
                *anomalies_by_metric.entry(pass.metric.to_string()).or_default() += count;
            }
            for anomaly in &pass.report.anomalies {
                anomalous.insert(anomaly.record.identity(), anomaly.record.spend);
                if !anomaly.record.ad_provider.is_empty() {
                    *spend_by_provider.entry(&anomaly.record.ad_provider).or_default() +=
                        anomaly.record.spend;
                }
            }
        }

        let worst_provider = spend_by_provider
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(provider, _)| provider.to_string());

        AccountSummary {
            anomalies_by_metric,
            total_anomalous_spend: round2(anomalous.values().sum()),
            worst_provider,
            breakdowns: BREAKDOWN_DIMENSIONS
                .iter()
                .map(|dim| breakdown_by(records, dim))
                .collect(),
        }
    }
}
