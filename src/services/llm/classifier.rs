//! Model-backed ad health classification.
//!
//! The classifier asks the model for a structured JSON verdict on one ad,
//! validates it against the numeric record, and retries with violation
//! feedback before degrading to a manual-review object. Transport errors
//! are not validation failures and propagate to the caller.

use std::sync::Arc;

use serde_json::Value;

use super::client::LlmClient;
use super::models::LlmError;
use super::strip_code_fences;
use crate::models::MetricRecord;
use crate::services::grounding::{
    DegradedClassification, GroundingValidator, RetryDecision, RetryStateMachine,
};

/// Terminal result of one classification loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    /// Validated verdict, safe to show to users.
    Classified(Value),
    /// Retries exhausted; fixed manual-review object.
    Degraded(DegradedClassification),
}

pub struct AdClassifier {
    client: Arc<dyn LlmClient>,
    validator: GroundingValidator,
}

impl AdClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, validator: GroundingValidator::new() }
    }

    /// Classify one ad, looping generate -> parse -> validate until the
    /// verdict passes or the retry budget runs out.
    pub async fn classify(
        &self,
        record: &MetricRecord,
    ) -> Result<ClassificationOutcome, LlmError> {
        let mut machine = RetryStateMachine::new();
        let mut feedback: Vec<String> = Vec::new();

        loop {
            let prompt = build_prompt(record, &feedback);
            let generated = self.client.generate(&prompt).await?;
            let cleaned = strip_code_fences(&generated);

            let (parsed, violations) = match serde_json::from_str::<Value>(&cleaned) {
                Ok(value) => {
                    let result = self.validator.validate_classification(&value, record);
                    if result.is_valid {
                        tracing::debug!(ad = %record.identity(), "classification validated");
                        return Ok(ClassificationOutcome::Classified(value));
                    }
                    (Some(value), result.violations)
                },
                Err(e) => (
                    Some(Value::String(cleaned)),
                    vec![format!("Response is not valid JSON: {}", e)],
                ),
            };

            match machine.on_failure(violations, parsed) {
                RetryDecision::Retry { attempt, feedback: violations } => {
                    tracing::debug!(
                        ad = %record.identity(),
                        attempt,
                        "classification rejected, regenerating with feedback"
                    );
                    feedback = violations;
                },
                RetryDecision::Degrade(degraded) => {
                    return Ok(ClassificationOutcome::Degraded(degraded));
                },
            }
        }
    }
}

fn build_prompt(record: &MetricRecord, feedback: &[String]) -> String {
    let mut prompt = format!(
        "Classify the health of ad '{}' from these exact figures.\n\
         Spend: {:.2}. ROAS: {:.2}. CPA: {:.2}. Days active: {}.\n\
         Respond with JSON only, using keys ad_name, metrics (spend, roas, days_active), \
         classification (good|ok|warning|bad|wait), recommended_action \
         (scale|monitor|review|reduce|pause|wait), confidence (high|medium|low), \
         and user_explanation. Cite only the figures above in the explanation.",
        record.ad_name, record.spend, record.roas, record.cpa, record.days_active,
    );
    if !feedback.is_empty() {
        prompt.push_str("\nYour previous answer was rejected: ");
        prompt.push_str(&feedback.join("; "));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::InvalidResponse("script exhausted".into())))
        }
    }

    fn record() -> MetricRecord {
        MetricRecord {
            ad_name: "spring_sale".to_string(),
            ad_id: "a-1".to_string(),
            spend: 1000.0,
            roas: 2.5,
            days_active: 20,
            ..Default::default()
        }
    }

    fn valid_verdict() -> String {
        serde_json::json!({
            "ad_name": "spring_sale",
            "metrics": {"spend": 1000.0, "roas": 2.5, "days_active": 20},
            "classification": "ok",
            "recommended_action": "monitor",
            "confidence": "medium",
            "user_explanation": "Spend of 1000 is returning 2.5x after 20 days."
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_valid_verdict_passes_first_try() {
        let client = ScriptedClient::new(vec![Ok(valid_verdict())]);
        let classifier = AdClassifier::new(client);
        let outcome = classifier.classify(&record()).await.unwrap();
        let ClassificationOutcome::Classified(value) = outcome else {
            panic!("expected classified outcome");
        };
        assert_eq!(value["classification"], "ok");
    }

    #[tokio::test]
    async fn test_fenced_verdict_is_unwrapped() {
        let fenced = format!("```json\n{}\n```", valid_verdict());
        let client = ScriptedClient::new(vec![Ok(fenced)]);
        let classifier = AdClassifier::new(client);
        let outcome = classifier.classify(&record()).await.unwrap();
        assert!(matches!(outcome, ClassificationOutcome::Classified(_)));
    }

    #[tokio::test]
    async fn test_three_bad_verdicts_degrade_with_feedback() {
        let bad = serde_json::json!({
            "ad_name": "spring_sale",
            "metrics": {"spend": 1000.0, "roas": 2.5, "days_active": 20},
            "classification": "excellent",
            "recommended_action": "monitor",
            "confidence": "medium",
            "user_explanation": "Spend of 1000 is fine."
        })
        .to_string();
        let client =
            ScriptedClient::new(vec![Ok(bad.clone()), Ok(bad.clone()), Ok(bad.clone())]);
        let classifier = AdClassifier::new(Arc::clone(&client) as Arc<dyn LlmClient>);

        let outcome = classifier.classify(&record()).await.unwrap();
        let ClassificationOutcome::Degraded(degraded) = outcome else {
            panic!("expected degraded outcome");
        };
        assert_eq!(degraded.classification, "manual-review");
        assert!(degraded.original_response.is_some());

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].contains("previous answer was rejected"));
        assert!(prompts[2].contains("previous answer was rejected"));
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let client = ScriptedClient::new(vec![Ok("not json at all".into()), Ok(valid_verdict())]);
        let classifier = AdClassifier::new(Arc::clone(&client) as Arc<dyn LlmClient>);
        let outcome = classifier.classify(&record()).await.unwrap();
        assert!(matches!(outcome, ClassificationOutcome::Classified(_)));

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[1].contains("not valid JSON"));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let client = ScriptedClient::new(vec![Err(LlmError::RateLimited)]);
        let classifier = AdClassifier::new(client);
        let err = classifier.classify(&record()).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }
}
