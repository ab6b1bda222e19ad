use thiserror::Error;

/// Why a completion could not be produced.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Failed to configure upstream client: {0}")]
    Configuration(String),

    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse upstream response: {0}")]
    Parse(String),
}

impl UpstreamError {
    /// Description safe to show to end users. Never contains provider text.
    pub fn public_message(&self) -> String {
        match self {
            UpstreamError::Configuration(_) => "completion service is misconfigured".to_string(),
            UpstreamError::Transport(e) if e.is_timeout() => {
                "completion service timed out".to_string()
            }
            UpstreamError::Transport(_) => "completion service is unreachable".to_string(),
            UpstreamError::Status { status, .. } => {
                format!("completion service returned status {}", status)
            }
            UpstreamError::Parse(_) => "completion service returned an unexpected response".to_string(),
        }
    }

    /// Network errors, rate limiting and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            UpstreamError::Configuration(_) | UpstreamError::Parse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_message_hides_upstream_body() {
        let err = UpstreamError::Status {
            status: 503,
            body: "{\"error\":\"provider overloaded: key sk-or-123\"}".to_string(),
        };
        let message = err.public_message();
        assert_eq!(message, "completion service returned status 503");
        assert!(!message.contains("provider overloaded"));
    }

    #[test]
    fn retries_only_transient_statuses() {
        let status = |status| UpstreamError::Status {
            status,
            body: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!UpstreamError::Parse("no choices".to_string()).is_retryable());
    }
}
