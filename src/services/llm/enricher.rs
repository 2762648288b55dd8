//! Reasoning enrichment with grounded fallback.
//!
//! Each recommendation's template reasoning may be rewritten by the model,
//! but only text that passes grounding validation is accepted. Enrichment
//! fans out one task per recommendation and merges results back by ad
//! identity, so completion order can never corrupt the priority-sorted list.
//! Every failure mode (transport error, timeout, validation, batch
//! cancellation) leaves the template text and provenance untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use super::client::LlmClient;
use super::strip_code_fences;
use crate::config::LlmConfig;
use crate::models::{Recommendation, ReasoningSource};
use crate::services::grounding::{GroundingValidator, RetryDecision, RetryStateMachine};

pub struct ReasoningEnricher {
    client: Arc<dyn LlmClient>,
    config: LlmConfig,
}

impl ReasoningEnricher {
    pub fn new(client: Arc<dyn LlmClient>, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Enrich reasoning text in place. Only `reasoning` and
    /// `reasoning_source` are ever written; numeric fields are immutable
    /// after creation.
    pub async fn enrich(&self, recommendations: &mut [Recommendation]) {
        if recommendations.is_empty() {
            return;
        }
        if !self.config.enabled || !self.client.is_enabled() {
            tracing::debug!("enrichment disabled, keeping template reasoning");
            return;
        }

        let mut tasks: JoinSet<(String, Option<String>)> = JoinSet::new();
        for rec in recommendations.iter() {
            let client = Arc::clone(&self.client);
            let rec = rec.clone();
            let per_call_timeout = Duration::from_secs(self.config.timeout_secs);
            tasks.spawn(async move {
                let key = rec_key(&rec);
                let text = enrich_one(client, &rec, per_call_timeout).await;
                (key, text)
            });
        }

        // Patches are collected keyed by ad identity; the batch budget caps
        // the whole fan-out. On expiry the stragglers are cancelled and their
        // recommendations simply keep template provenance.
        let mut patches: HashMap<String, String> = HashMap::new();
        let budget = Duration::from_secs(self.config.batch_timeout_secs);
        let drained = tokio::time::timeout(budget, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((key, Some(text))) => {
                        patches.insert(key, text);
                    },
                    Ok((_, None)) => {},
                    Err(e) => tracing::warn!(error = %e, "enrichment task panicked"),
                }
            }
        })
        .await;

        if drained.is_err() {
            tasks.abort_all();
            tracing::warn!(
                budget_secs = self.config.batch_timeout_secs,
                "enrichment batch timed out, remaining ads keep template reasoning"
            );
        }

        let enriched = patches.len();
        for rec in recommendations.iter_mut() {
            if let Some(text) = patches.remove(&rec_key(rec)) {
                rec.reasoning = text;
                rec.reasoning_source = ReasoningSource::LlmEnriched;
            }
        }
        tracing::info!(
            enriched,
            total = recommendations.len(),
            "reasoning enrichment finished"
        );
    }
}

/// Generate-validate loop for one recommendation. Violations feed back into
/// the next prompt; the retry state machine bounds the loop. Returns `None`
/// whenever the template text should be kept.
async fn enrich_one(
    client: Arc<dyn LlmClient>,
    rec: &Recommendation,
    per_call_timeout: Duration,
) -> Option<String> {
    let validator = GroundingValidator::new();
    let mut machine = RetryStateMachine::new();
    let mut feedback: Vec<String> = Vec::new();

    loop {
        let prompt = build_prompt(rec, &feedback);
        let generated = match tokio::time::timeout(per_call_timeout, client.generate(&prompt)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::debug!(ad = %rec.ad_name, error = %e, "enrichment call failed");
                return None;
            },
            Err(_) => {
                tracing::debug!(ad = %rec.ad_name, "enrichment call timed out");
                return None;
            },
        };

        let cleaned = strip_code_fences(&generated);
        let result = validator.validate_reasoning(&cleaned, rec);
        if result.is_valid {
            return Some(cleaned);
        }

        match machine.on_failure(result.violations, None) {
            RetryDecision::Retry { feedback: violations, .. } => feedback = violations,
            RetryDecision::Degrade(_) => {
                tracing::debug!(
                    ad = %rec.ad_name,
                    "enrichment exhausted retries, keeping template reasoning"
                );
                return None;
            },
        }
    }
}

fn rec_key(rec: &Recommendation) -> String {
    if rec.ad_id.is_empty() { rec.ad_name.clone() } else { rec.ad_id.clone() }
}

fn build_prompt(rec: &Recommendation, feedback: &[String]) -> String {
    let mut prompt = format!(
        "Rewrite this budget recommendation for ad '{}' as one short paragraph a marketer \
         can act on.\nAction: {} ({}%).\nCurrent spend: {:.2}. Proposed spend: {:.2}. \
         Estimated impact: {:.2}.\nTemplate reasoning: {}\nUse only the numbers given above; \
         do not cite external statistics or benchmarks.",
        rec.ad_name,
        rec.action.as_str(),
        rec.change_pct,
        rec.current_spend,
        rec.proposed_spend,
        rec.estimated_impact,
        rec.reasoning,
    );
    if !feedback.is_empty() {
        prompt.push_str("\nYour previous answer was rejected: ");
        prompt.push_str(&feedback.join("; "));
    }
    prompt
}
