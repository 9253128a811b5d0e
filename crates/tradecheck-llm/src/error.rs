use thiserror::Error;

/// Failure of one completion attempt.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: not configured ({reason})")]
    NotConfigured { provider: String, reason: String },

    #[error("{provider}: request timed out")]
    Timeout { provider: String },

    #[error("{provider}: transport error: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: HTTP {status}: {body}")]
    Status { provider: String, status: u16, body: String },

    #[error("{provider}: empty completion")]
    EmptyResponse { provider: String },

    #[error("{provider}: malformed response: {detail}")]
    MalformedResponse { provider: String, detail: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("all providers failed: {}", summarize(.0))]
    AllProvidersFailed(Vec<(String, String)>),
}

impl ProviderError {
    /// Whether the next provider in a chain should be tried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProviderError::NotConfigured { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::Transport { .. }
                | ProviderError::Status { .. }
                | ProviderError::EmptyResponse { .. }
                | ProviderError::MalformedResponse { .. }
        )
    }
}

fn summarize(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures.iter().map(|(name, err)| format!("[{name}] {err}")).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_subset() {
        assert!(ProviderError::Timeout { provider: "glm".into() }.is_recoverable());
        assert!(ProviderError::Status { provider: "groq".into(), status: 503, body: String::new() }.is_recoverable());
        assert!(!ProviderError::InvalidRequest("max_tokens must be > 0".into()).is_recoverable());
        assert!(!ProviderError::AllProvidersFailed(vec![]).is_recoverable());
    }

    #[test]
    fn all_failed_lists_each_provider() {
        let err = ProviderError::AllProvidersFailed(vec![
            ("glm".into(), "glm: request timed out".into()),
            ("groq".into(), "groq: empty completion".into()),
        ]);
        assert_eq!(err.to_string(), "all providers failed: [glm] glm: request timed out; [groq] groq: empty completion");
        assert_eq!(ProviderError::AllProvidersFailed(vec![]).to_string(), "all providers failed: no providers configured");
    }
}
