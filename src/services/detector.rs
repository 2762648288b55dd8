//! Statistical anomaly detection over ad metric records.
//!
//! Two modes share one contract: pre-computed-score mode reads the `z_*`
//! fields the warehouse already standardized, raw-value mode derives scores
//! from the eligible population itself. Insufficient or degenerate input is
//! reported as a warning, never an error.

use crate::config::DetectorConfig;
use crate::models::{
    Anomaly, BaselineStats, DetectionReport, Direction, Metric, MetricRecord, Severity,
};
use crate::utils::stats;

/// Offset applied before the log transform so zero-valued metrics survive.
const LOG_EPSILON: f64 = 1e-8;

/// Metrics covered by the log-domain standardization pass.
const STANDARDIZED_METRICS: [Metric; 4] = [Metric::Cpa, Metric::Roas, Metric::Ctr, Metric::Cvr];

pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Detect anomalies using the configured sigma threshold.
    pub fn detect(
        &self,
        records: &[MetricRecord],
        metric: Metric,
        direction: Direction,
    ) -> DetectionReport {
        self.detect_with_threshold(records, metric, self.config.threshold_sigma, direction)
    }

    /// Detect anomalies at an explicit threshold.
    ///
    /// Eligibility: spend >= `min_spend`. Output is sorted by `|score|`
    /// descending; downstream stages rely on that ordering when they take
    /// only the top N.
    pub fn detect_with_threshold(
        &self,
        records: &[MetricRecord],
        metric: Metric,
        threshold: f64,
        direction: Direction,
    ) -> DetectionReport {
        let eligible: Vec<&MetricRecord> =
            records.iter().filter(|r| r.spend >= self.config.min_spend).collect();

        if eligible.len() < self.config.min_sample_size {
            tracing::debug!(
                metric = %metric,
                eligible = eligible.len(),
                required = self.config.min_sample_size,
                "sample too small for detection"
            );
            return DetectionReport::warning(format!(
                "Insufficient sample size: {} < {}",
                eligible.len(),
                self.config.min_sample_size
            ));
        }

        if metric.is_standardized() {
            self.detect_precomputed(&eligible, metric, threshold, direction)
        } else {
            self.detect_raw(&eligible, metric, threshold, direction)
        }
    }

    /// Pre-computed-score mode: the `z_*` field is the score. Records missing
    /// the field are malformed for this metric and excluded.
    fn detect_precomputed(
        &self,
        eligible: &[&MetricRecord],
        metric: Metric,
        threshold: f64,
        direction: Direction,
    ) -> DetectionReport {
        let mut anomalies: Vec<Anomaly> = eligible
            .iter()
            .filter_map(|record| {
                let score = metric.score_of(record)?;
                flagged(score, threshold, direction).then(|| Anomaly {
                    record: (*record).clone(),
                    metric,
                    value: metric.value_of(record),
                    baseline: None,
                    score,
                    direction: observed_direction(score),
                    severity: self.severity(score.abs()),
                })
            })
            .collect();

        sort_by_score_magnitude(&mut anomalies);
        DetectionReport { anomalies, baseline_stats: None, warning: None }
    }

    /// Raw-value mode: standardize against the eligible population's own
    /// mean and standard deviation.
    fn detect_raw(
        &self,
        eligible: &[&MetricRecord],
        metric: Metric,
        threshold: f64,
        direction: Direction,
    ) -> DetectionReport {
        let values: Vec<f64> = eligible.iter().map(|r| metric.value_of(r)).collect();

        // Population is non-empty here; min_sample_size >= 2 is enforced by
        // config validation.
        let Some(mean) = stats::mean(&values) else {
            return DetectionReport::warning("Empty population".to_string());
        };
        let Some(std) = stats::sample_std(&values) else {
            return DetectionReport::warning("Empty population".to_string());
        };

        if std == 0.0 {
            return DetectionReport::warning(
                "Zero standard deviation - all values are identical".to_string(),
            );
        }

        let baseline = BaselineStats {
            mean,
            std,
            median: stats::median(&values).unwrap_or(mean),
            count: values.len(),
        };

        let mut anomalies: Vec<Anomaly> = eligible
            .iter()
            .zip(values.iter())
            .filter_map(|(record, value)| {
                let score = (value - mean) / std;
                flagged(score, threshold, direction).then(|| Anomaly {
                    record: (*record).clone(),
                    metric,
                    value: *value,
                    baseline: Some(mean),
                    score,
                    direction: observed_direction(score),
                    severity: self.severity(score.abs()),
                })
            })
            .collect();

        sort_by_score_magnitude(&mut anomalies);
        DetectionReport { anomalies, baseline_stats: Some(baseline), warning: None }
    }

    /// Log-domain standardization for warehouse-style pre-aggregation.
    ///
    /// Ratio-like metrics (CPA, ROAS, CTR, CVR) are multiplicative, so scores
    /// are computed on `ln(x + 1e-8)` with population variance, rounded to
    /// four decimals, and written into the `z_*` fields of the returned copy.
    pub fn standardize_log_domain(&self, records: &[MetricRecord]) -> Vec<MetricRecord> {
        let mut out: Vec<MetricRecord> = records.to_vec();

        for metric in STANDARDIZED_METRICS {
            let logs: Vec<f64> =
                out.iter().map(|r| (metric.value_of(r) + LOG_EPSILON).ln()).collect();
            let Some(mean) = stats::mean(&logs) else { continue };
            let std = stats::population_std(&logs).unwrap_or(0.0);

            for (record, log_value) in out.iter_mut().zip(logs.iter()) {
                let score =
                    if std == 0.0 { 0.0 } else { stats::round4((log_value - mean) / std) };
                match metric {
                    Metric::Cpa => record.z_cpa = Some(score),
                    Metric::Roas => record.z_roas = Some(score),
                    Metric::Ctr => record.z_ctr = Some(score),
                    Metric::Cvr => record.z_cvr = Some(score),
                    _ => {},
                }
            }
        }

        out
    }

    /// Highest matching tier wins; cut points come from config and are
    /// validated to be ordered.
    fn severity(&self, score_abs: f64) -> Severity {
        if score_abs >= self.config.severity_extreme {
            Severity::Extreme
        } else if score_abs >= self.config.severity_significant {
            Severity::Significant
        } else if score_abs >= self.config.severity_mild {
            Severity::Mild
        } else {
            Severity::Normal
        }
    }
}

fn flagged(score: f64, threshold: f64, direction: Direction) -> bool {
    match direction {
        Direction::High => score >= threshold,
        Direction::Low => score <= -threshold,
        Direction::Both => score.abs() >= threshold,
    }
}

fn observed_direction(score: f64) -> Direction {
    if score >= 0.0 { Direction::High } else { Direction::Low }
}

fn sort_by_score_magnitude(anomalies: &mut [Anomaly]) {
    anomalies.sort_by(|a, b| {
        b.score
            .abs()
            .partial_cmp(&a.score.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
