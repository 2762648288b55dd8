//! Grounding validation: generated text is only trusted when every number
//! and claim in it traces back to the numeric source-of-truth.

pub mod freetext;
pub mod retry;
pub mod validator;

pub use retry::{DegradedClassification, RetryDecision, RetryStateMachine, ValidationState, MAX_RETRIES};
pub use validator::{GroundingValidator, ValidationResult};
