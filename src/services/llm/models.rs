use thiserror::Error;

/// LLM transport and protocol errors.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM enrichment is disabled by configuration")]
    Disabled,

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether a caller may reasonably try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Timeout(_) | LlmError::RateLimited | LlmError::Network(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // client-level timeout carries no duration; 0 means "unknown"
            LlmError::Timeout(0)
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout(30).is_retryable());
        assert!(LlmError::RateLimited.is_retryable());
        assert!(!LlmError::Disabled.is_retryable());
        assert!(!LlmError::InvalidResponse("empty choices".into()).is_retryable());
        assert!(!LlmError::Api { status: 400, message: "bad request".into() }.is_retryable());
    }
}
