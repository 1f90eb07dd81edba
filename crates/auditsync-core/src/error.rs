//! Error taxonomy for a synchronisation run.
//!
//! Every variant except `InvalidArgument` is fatal for the run that raised
//! it: the run is abandoned, nothing reaches the sink and no checkpoint is
//! written. Retrying is left to whoever schedules the next run.

use auditsync_state::StateError;

/// Errors produced while synchronising an audit log.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A required header or body field is missing or unparseable.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The upstream API answered with a non-2xx status.
    #[error(
        "could not fetch audit log data, check configuration, access token scope and API rate limits. status_code: {status} - url: {url}"
    )]
    UpstreamRequest { status: u16, url: String },

    /// Remaining request quota is zero.
    #[error("API rate limit reached, no data can be fetched until the rate limit resets at {reset_timestamp}")]
    RateLimitExhausted { reset_timestamp: i64 },

    /// Internal misuse of an API, e.g. truncating past the end of a run.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Network failure or request timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Host configuration rejected before any request was issued.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("checkpoint state error: {0}")]
    State(#[from] StateError),

    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

/// Result type for synchronisation operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_names_status_and_url() {
        let err = SyncError::UpstreamRequest {
            status: 401,
            url: "https://api.github.com/enterprises/acme/audit-log".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status_code: 401"));
        assert!(msg.contains("/enterprises/acme/audit-log"));
    }

    #[test]
    fn rate_limit_error_names_reset_time() {
        let err = SyncError::RateLimitExhausted {
            reset_timestamp: 1_615_036_681,
        };
        assert!(err.to_string().contains("1615036681"));
    }

    #[test]
    fn state_error_converts() {
        let err: SyncError = StateError::InvalidAccount("../x".to_string()).into();
        assert!(matches!(err, SyncError::State(_)));
    }
}
