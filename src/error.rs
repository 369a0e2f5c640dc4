//! Heimdall error types

use std::time::Duration;

/// Heimdall error types
#[derive(Debug, thiserror::Error)]
pub enum HeimdallError {
    // Caller-visible failures
    /// Every slot is taken. `estimated_wait` is advisory only.
    #[error(
        "too many scraping jobs in flight ({current_slots}/{max_slots} slots in use), \
         try again in about {}s",
        estimated_wait.as_secs()
    )]
    AdmissionDenied {
        current_slots: usize,
        max_slots: usize,
        estimated_wait: Duration,
    },

    #[error("external operation timed out after {}s", timeout.as_secs())]
    ExternalTimeout { timeout: Duration },

    #[error("external operation failed: {0}")]
    ExternalFailure(String),

    // Absorbed internally
    #[error("cache backend unavailable: {0}")]
    CacheUnavailable(String),

    #[error("invalid holder: {0}")]
    InvalidHolder(String),

    #[error("usage ledger error: {0}")]
    Ledger(String),

    // Admission authority transport
    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HeimdallError {
    /// Whether the caller may retry the same request later.
    ///
    /// Denials, timeouts and upstream failures are transient by nature.
    /// Everything else is a local or programming error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HeimdallError::AdmissionDenied { .. }
                | HeimdallError::ExternalTimeout { .. }
                | HeimdallError::ExternalFailure(_)
        )
    }

    /// Whether the error should be shown to the end user as the failure of
    /// the request. All other errors are logged and absorbed.
    pub fn is_user_visible(&self) -> bool {
        self.is_retryable()
    }

    /// Advisory wait before retrying, when the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HeimdallError::AdmissionDenied { estimated_wait, .. } => Some(*estimated_wait),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HeimdallError {
    fn from(err: std::io::Error) -> Self {
        HeimdallError::Transport(err.to_string())
    }
}

/// Result type alias for Heimdall operations
pub type Result<T> = std::result::Result<T, HeimdallError>;
