//! Batch execution of approved recommendations.
//!
//! The processor walks the recommendation list once, applies (or, in dry-run
//! mode, simulates) each action through an action-specific handler, and emits
//! a batch whose summary counts always partition the processed set. Audit
//! recording is best-effort: a failed file write logs a warning and falls
//! back to the console sink rather than failing the batch.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::audit::{AuditSink, ConsoleAuditSink};
use crate::models::{
    Action, ExecutionBatch, ExecutionRecord, ExecutionStatus, ExecutionSummary, Recommendation,
};

pub struct ExecutionProcessor {
    dry_run: bool,
    audit: Arc<dyn AuditSink>,
}

impl ExecutionProcessor {
    pub fn new(dry_run: bool, audit: Arc<dyn AuditSink>) -> Self {
        Self { dry_run, audit }
    }

    /// Execute a recommendation batch for one tenant.
    ///
    /// When `approved_ids` is given, only recommendations whose ad identity
    /// appears in the set are processed; everything else is dropped before
    /// execution, not skipped inside it.
    pub async fn execute_batch(
        &self,
        recommendations: &[Recommendation],
        approved_ids: Option<&HashSet<String>>,
        tenant: &str,
    ) -> ExecutionBatch {
        let selected: Vec<&Recommendation> = recommendations
            .iter()
            .filter(|rec| match approved_ids {
                Some(ids) => ids.contains(&identity(rec)),
                None => true,
            })
            .collect();

        let mut results = Vec::with_capacity(selected.len());
        let mut summary = ExecutionSummary { dry_run: self.dry_run, ..Default::default() };

        for rec in selected {
            let record = self.apply(rec);
            summary.total_processed += 1;
            match record.status {
                ExecutionStatus::Success => summary.success += 1,
                ExecutionStatus::Failed => summary.failed += 1,
                ExecutionStatus::Skipped => summary.skipped += 1,
            }
            results.push(record);
        }

        let batch = ExecutionBatch {
            batch_id: Uuid::new_v4().to_string(),
            results,
            summary,
            timestamp: Utc::now(),
        };

        tracing::info!(
            tenant,
            batch_id = %batch.batch_id,
            processed = batch.summary.total_processed,
            success = batch.summary.success,
            skipped = batch.summary.skipped,
            dry_run = self.dry_run,
            "execution batch complete"
        );

        if let Err(e) = self.audit.record(tenant, &batch).await {
            tracing::warn!(error = %e, "audit sink failed, falling back to console");
            if let Err(e) = ConsoleAuditSink.record(tenant, &batch).await {
                tracing::error!(error = %e, "console audit also failed");
            }
        }

        batch
    }

    fn apply(&self, rec: &Recommendation) -> ExecutionRecord {
        match rec.action {
            Action::Pause => self.pause(rec),
            Action::Reduce | Action::Scale => self.adjust_budget(rec),
            Action::RefreshCreative => self.refresh_creative(rec),
            Action::Unknown => self.skip(rec),
        }
    }

    fn pause(&self, rec: &Recommendation) -> ExecutionRecord {
        self.success(
            rec,
            format!("{} '{}' on {}", self.verb("Pause"), rec.ad_name, rec.provider),
            json!({
                "action_type": "pause",
                "provider": rec.provider,
                "spend_stopped": rec.current_spend,
            }),
        )
    }

    fn adjust_budget(&self, rec: &Recommendation) -> ExecutionRecord {
        let new_budget = rec.current_spend * (1.0 + f64::from(rec.change_pct) / 100.0);
        let direction = if rec.change_pct < 0 { "Reduce" } else { "Increase" };
        self.success(
            rec,
            format!(
                "{} budget for '{}' by {}%",
                self.verb(direction),
                rec.ad_name,
                rec.change_pct.abs()
            ),
            json!({
                "action_type": rec.action.as_str(),
                "provider": rec.provider,
                "current_budget": rec.current_spend,
                "new_budget": new_budget,
                "change_percent": rec.change_pct,
            }),
        )
    }

    fn refresh_creative(&self, rec: &Recommendation) -> ExecutionRecord {
        // creative production cannot be automated; flag it for a human
        self.success(
            rec,
            format!("{} creative refresh for '{}'", self.verb("Queue"), rec.ad_name),
            json!({
                "action_type": "refresh_creative",
                "provider": rec.provider,
                "requires_manual_action": true,
            }),
        )
    }

    fn skip(&self, rec: &Recommendation) -> ExecutionRecord {
        ExecutionRecord {
            ad_id: rec.ad_id.clone(),
            ad_name: rec.ad_name.clone(),
            action: rec.action,
            status: ExecutionStatus::Skipped,
            message: format!("Unsupported action: {}", rec.action.as_str()),
            details: json!({}),
            dry_run: self.dry_run,
        }
    }

    fn success(
        &self,
        rec: &Recommendation,
        message: String,
        details: serde_json::Value,
    ) -> ExecutionRecord {
        ExecutionRecord {
            ad_id: rec.ad_id.clone(),
            ad_name: rec.ad_name.clone(),
            action: rec.action,
            status: ExecutionStatus::Success,
            message,
            details,
            dry_run: self.dry_run,
        }
    }

    fn verb(&self, base: &str) -> String {
        if self.dry_run {
            format!("[DRY RUN] Would {}", base.to_lowercase())
        } else {
            base.to_string()
        }
    }
}

fn identity(rec: &Recommendation) -> String {
    if rec.ad_id.is_empty() { rec.ad_name.clone() } else { rec.ad_id.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, ReasoningSource};

    fn rec(name: &str, action: Action, spend: f64, change_pct: i32) -> Recommendation {
        Recommendation {
            action,
            ad_name: name.to_string(),
            ad_id: format!("{}-id", name),
            provider: "meta".to_string(),
            current_spend: spend,
            proposed_spend: spend * (1.0 + f64::from(change_pct) / 100.0),
            change_pct,
            reasoning: "test".to_string(),
            estimated_impact: spend * f64::from(change_pct.abs()) / 100.0,
            priority: Priority::High,
            confidence: 0.8,
            reasoning_source: ReasoningSource::TemplateFallback,
            root_causes: vec![],
        }
    }

    fn processor(dry_run: bool) -> ExecutionProcessor {
        ExecutionProcessor::new(dry_run, Arc::new(ConsoleAuditSink))
    }

    #[tokio::test]
    async fn test_pause_stops_full_spend() {
        let recs = vec![rec("bad_ad", Action::Pause, 1000.0, -100)];
        let batch = processor(false).execute_batch(&recs, None, "acme").await;

        assert_eq!(batch.results.len(), 1);
        let result = &batch.results[0];
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.details["spend_stopped"], 1000.0);
        assert!(result.message.starts_with("Pause"));
        assert!(!result.dry_run);
    }

    #[tokio::test]
    async fn test_reduce_computes_new_budget() {
        let recs = vec![rec("pricey", Action::Reduce, 800.0, -50)];
        let batch = processor(false).execute_batch(&recs, None, "acme").await;

        let details = &batch.results[0].details;
        assert_eq!(details["current_budget"], 800.0);
        assert_eq!(details["new_budget"], 400.0);
        assert_eq!(details["change_percent"], -50);
    }

    #[tokio::test]
    async fn test_scale_increases_budget() {
        let recs = vec![rec("winner", Action::Scale, 500.0, 30)];
        let batch = processor(false).execute_batch(&recs, None, "acme").await;

        let details = &batch.results[0].details;
        assert_eq!(details["new_budget"], 650.0);
        assert!(batch.results[0].message.contains("Increase"));
    }

    #[tokio::test]
    async fn test_refresh_creative_requires_manual_action() {
        let recs = vec![rec("stale", Action::RefreshCreative, 300.0, 0)];
        let batch = processor(false).execute_batch(&recs, None, "acme").await;

        let result = &batch.results[0];
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.details["requires_manual_action"], true);
    }

    #[tokio::test]
    async fn test_unknown_action_is_skipped_not_failed() {
        let recs = vec![rec("mystery", Action::Unknown, 100.0, 0)];
        let batch = processor(false).execute_batch(&recs, None, "acme").await;

        let result = &batch.results[0];
        assert_eq!(result.status, ExecutionStatus::Skipped);
        assert_eq!(result.message, "Unsupported action: unknown");
        assert_eq!(batch.summary.skipped, 1);
        assert_eq!(batch.summary.success, 0);
    }

    #[tokio::test]
    async fn test_dry_run_marks_every_record_and_summary() {
        let recs = vec![
            rec("a", Action::Pause, 1000.0, -100),
            rec("b", Action::Reduce, 500.0, -25),
        ];
        let batch = processor(true).execute_batch(&recs, None, "acme").await;

        assert!(batch.summary.dry_run);
        for result in &batch.results {
            assert!(result.dry_run);
            assert!(result.message.starts_with("[DRY RUN] Would "));
            assert_eq!(result.status, ExecutionStatus::Success);
        }
    }

    #[tokio::test]
    async fn test_approved_set_filters_before_execution() {
        let recs = vec![
            rec("keep", Action::Pause, 1000.0, -100),
            rec("drop", Action::Reduce, 500.0, -25),
        ];
        let approved: HashSet<String> = ["keep-id".to_string()].into();
        let batch = processor(true).execute_batch(&recs, Some(&approved), "acme").await;

        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.results[0].ad_name, "keep");
        assert_eq!(batch.summary.total_processed, 1);
    }

    #[tokio::test]
    async fn test_counts_partition_mixed_batch() {
        let recs = vec![
            rec("a", Action::Pause, 1000.0, -100),
            rec("b", Action::Unknown, 500.0, 0),
            rec("c", Action::Scale, 200.0, 30),
        ];
        let batch = processor(false).execute_batch(&recs, None, "acme").await;

        assert!(batch.counts_consistent());
        assert_eq!(batch.summary.success, 2);
        assert_eq!(batch.summary.skipped, 1);
        assert_eq!(batch.summary.failed, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_consistent() {
        let batch = processor(true).execute_batch(&[], None, "acme").await;
        assert!(batch.counts_consistent());
        assert_eq!(batch.summary.total_processed, 0);
    }
}
