//! Structural and numeric validation of generated content against its
//! numeric source-of-truth.
//!
//! Two callers share this mechanism: structured classification responses are
//! checked field by field against the source record, and enrichment prose is
//! checked token by token against the recommendation it describes.

use serde_json::Value;

use super::freetext;
use crate::models::{MetricRecord, Recommendation};

/// Validity plus the ordered violation list. Consumed immediately by the
/// retry/degrade machinery, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub violations: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, violations: vec![] }
    }

    pub fn failed(violations: Vec<String>) -> Self {
        Self { is_valid: violations.is_empty(), violations }
    }
}

const REQUIRED_FIELDS: [&str; 6] = [
    "ad_name",
    "metrics",
    "classification",
    "recommended_action",
    "confidence",
    "user_explanation",
];

const CLASSIFICATION_VOCAB: [&str; 5] = ["good", "ok", "warning", "bad", "wait"];
const ACTION_VOCAB: [&str; 6] = ["scale", "monitor", "review", "reduce", "pause", "wait"];
const CONFIDENCE_VOCAB: [&str; 3] = ["high", "medium", "low"];

const SPEND_TOLERANCE: f64 = 1.0;
const RATIO_TOLERANCE: f64 = 0.01;

pub struct GroundingValidator;

impl GroundingValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a structured classification response against the record it
    /// claims to describe.
    pub fn validate_classification(
        &self,
        response: &Value,
        source: &MetricRecord,
    ) -> ValidationResult {
        let mut violations: Vec<String> = Vec::new();

        for field in REQUIRED_FIELDS {
            if response.get(field).is_none() {
                violations.push(format!("Missing required field: {}", field));
            }
        }

        check_vocab(response, "classification", &CLASSIFICATION_VOCAB, &mut violations);
        check_vocab(response, "recommended_action", &ACTION_VOCAB, &mut violations);
        check_vocab(response, "confidence", &CONFIDENCE_VOCAB, &mut violations);

        if let Some(metrics) = response.get("metrics") {
            if let Some(cited) = metrics.get("spend").and_then(Value::as_f64)
                && (cited - source.spend).abs() > SPEND_TOLERANCE
            {
                violations.push(format!(
                    "Cited spend {} does not match source spend {}",
                    cited, source.spend
                ));
            }
            if let Some(cited) = metrics.get("roas").and_then(Value::as_f64)
                && (cited - source.roas).abs() > RATIO_TOLERANCE
            {
                violations.push(format!(
                    "Cited roas {} does not match source roas {}",
                    cited, source.roas
                ));
            }
            if let Some(cited) = metrics.get("days_active").and_then(Value::as_i64)
                && cited != source.days_active
            {
                violations.push(format!(
                    "Cited days_active {} does not match source days_active {}",
                    cited, source.days_active
                ));
            }
        }

        if let Some(explanation) = response.get("user_explanation").and_then(Value::as_str) {
            violations.extend(freetext::lexical_violations(explanation));
            violations
                .extend(freetext::numeric_violations(explanation, &record_numbers(source)));
        }

        if !violations.is_empty() {
            tracing::debug!(
                ad = %source.ad_name,
                count = violations.len(),
                "classification response failed grounding"
            );
        }
        ValidationResult::failed(violations)
    }

    /// Validate free-text enrichment prose against the recommendation's own
    /// numeric fields. Numeric fields of the recommendation are never touched
    /// here; the caller decides what to do with the text.
    pub fn validate_reasoning(
        &self,
        text: &str,
        recommendation: &Recommendation,
    ) -> ValidationResult {
        let mut violations = freetext::lexical_violations(text);
        violations
            .extend(freetext::numeric_violations(text, &recommendation_numbers(recommendation)));
        ValidationResult::failed(violations)
    }
}

impl Default for GroundingValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_vocab(response: &Value, field: &str, vocab: &[&str], violations: &mut Vec<String>) {
    if let Some(value) = response.get(field).and_then(Value::as_str)
        && !vocab.iter().any(|v| v.eq_ignore_ascii_case(value))
    {
        violations.push(format!("Invalid {}: '{}'", field, value));
    }
}

/// Every number a response about this record may legitimately cite.
fn record_numbers(record: &MetricRecord) -> Vec<f64> {
    vec![
        record.spend,
        record.cpa,
        record.roas,
        record.ctr,
        record.cvr,
        record.purchases,
        record.conversion_value,
        record.total_impressions as f64,
        record.total_clicks as f64,
        record.days_active as f64,
    ]
}

fn recommendation_numbers(rec: &Recommendation) -> Vec<f64> {
    vec![
        rec.current_spend,
        rec.proposed_spend,
        rec.estimated_impact,
        f64::from(rec.change_pct),
        rec.confidence,
    ]
}
