use thiserror::Error;

/// Failures raised while talking to the external video platform.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("access credential rejected by the video platform: {0}")]
    Auth(String),

    #[error("video platform quota exhausted: {0}")]
    RateLimit(String),

    #[error("transient network failure: {0}")]
    TransientNetwork(String),
}

impl SourceError {
    /// Auth failures are fatal and never retried; everything else may be.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::Auth(_))
    }
}

/// Failures raised by the storage layer or by invalid search input.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unreachable: {0}")]
    BackendUnavailable(String),

    #[error("search query must not be empty")]
    InvalidQuery,

    #[error("unknown search source '{0}', expected 'json' or 'solr'")]
    InvalidSource(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_is_not_retryable() {
        assert!(!SourceError::Auth("expired".into()).is_retryable());
        assert!(SourceError::RateLimit("quota".into()).is_retryable());
        assert!(SourceError::TransientNetwork("timeout".into()).is_retryable());
    }
}
