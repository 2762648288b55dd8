//! Optional model integration: transport client, health classifier, and
//! reasoning enricher. Everything here is best-effort; the numeric pipeline
//! never depends on a model being reachable.

pub mod classifier;
pub mod client;
pub mod enricher;
pub mod models;

pub use classifier::{AdClassifier, ClassificationOutcome};
pub use client::{HttpLlmClient, LlmClient};
pub use enricher::ReasoningEnricher;
pub use models::LlmError;

/// Strip a markdown code fence (```json ... ``` or ``` ... ```) wrapping a
/// model response. Text without a fence passes through trimmed.
pub(crate) fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // drop the language tag on the opening fence line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fenced_json() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fence() {
        let fenced = "```\nplain text\n```";
        assert_eq!(strip_code_fences(fenced), "plain text");
    }

    #[test]
    fn test_unfenced_passthrough() {
        assert_eq!(strip_code_fences("  hello  "), "hello");
    }
}
