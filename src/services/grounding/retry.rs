//! Retry-then-degrade control flow for failed validations.
//!
//! Exactly two retries are allowed. The third consecutive failure produces a
//! single terminal manual-review object and the machine stops; this boundary
//! is load-bearing for callers that budget regeneration calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Retries allowed before degrading.
pub const MAX_RETRIES: u32 = 2;

/// Lifecycle of one validated generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Pending,
    /// Awaiting regeneration attempt `attempt` (1-based).
    Retry { attempt: u32 },
    Degraded,
}

/// What the caller should do after a validation failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Regenerate, feeding the violations back into the prompt.
    Retry { attempt: u32, feedback: Vec<String> },
    /// Stop retrying and surface the terminal object.
    Degrade(DegradedClassification),
}

/// Fixed terminal object emitted after the retry budget is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedClassification {
    pub classification: String,
    pub recommended_action: String,
    pub confidence: String,
    pub user_explanation: String,
    pub violations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_response: Option<Value>,
}

impl DegradedClassification {
    fn new(violations: Vec<String>, original_response: Option<Value>) -> Self {
        Self {
            classification: "manual-review".to_string(),
            recommended_action: "review".to_string(),
            confidence: "low".to_string(),
            user_explanation:
                "Automatic classification failed validation and was routed for manual review."
                    .to_string(),
            violations,
            original_response,
        }
    }
}

/// State machine driving one classify-validate loop.
pub struct RetryStateMachine {
    state: ValidationState,
    max_retries: u32,
}

impl RetryStateMachine {
    pub fn new() -> Self {
        Self { state: ValidationState::Pending, max_retries: MAX_RETRIES }
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    /// Record a validation failure and decide the next step.
    ///
    /// Failures past the degraded state keep returning the terminal object
    /// without further transitions.
    pub fn on_failure(
        &mut self,
        violations: Vec<String>,
        original_response: Option<Value>,
    ) -> RetryDecision {
        match self.state {
            ValidationState::Pending => {
                self.state = ValidationState::Retry { attempt: 1 };
                RetryDecision::Retry { attempt: 1, feedback: violations }
            },
            ValidationState::Retry { attempt } if attempt < self.max_retries => {
                let next = attempt + 1;
                self.state = ValidationState::Retry { attempt: next };
                RetryDecision::Retry { attempt: next, feedback: violations }
            },
            _ => {
                self.state = ValidationState::Degraded;
                tracing::warn!(
                    violation_count = violations.len(),
                    "validation retries exhausted, degrading to manual review"
                );
                RetryDecision::Degrade(DegradedClassification::new(violations, original_response))
            },
        }
    }
}

impl Default for RetryStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
