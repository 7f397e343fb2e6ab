//! Recovery Port (Driven Port)
//!
//! Submits recovery requests. The HTTP response only confirms acceptance;
//! completion arrives later as a `snapshot_complete` feed message carrying
//! the same request id.

use async_trait::async_trait;

use crate::domain::{Producer, Urn};

/// Errors returned by API operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response.
    #[error("{url} returned {status}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Connection or protocol failure.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Error details.
        message: String,
    },

    /// Per-request deadline exceeded.
    #[error("request to {url} timed out")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// Cancelled by shutdown.
    #[error("request to {url} cancelled")]
    Cancelled {
        /// Request URL.
        url: String,
    },

    /// Response body did not match the expected schema.
    #[error("cannot decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Error details.
        message: String,
    },

    /// Request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Replay control used outside the replay-capable environments.
    #[error("replay is not available in the {environment} environment")]
    ReplayUnavailable {
        /// Configured environment.
        environment: String,
    },
}

impl ApiError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                matches!(*status, 408 | 429) || (*status >= 500 && *status < 600)
            }
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Cancelled { .. }
            | Self::Decode { .. }
            | Self::InvalidRequest(_)
            | Self::ReplayUnavailable { .. } => false,
        }
    }

    /// HTTP status, for status errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Port for recovery requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecoveryPort: Send + Sync {
    /// Request replay for a producer.
    ///
    /// A timestamp of zero or less requests full recovery, otherwise
    /// everything after the timestamp is replayed.
    async fn request_recovery(
        &self,
        producer: Producer,
        timestamp: i64,
        request_id: i64,
    ) -> Result<(), ApiError>;

    /// Request replay of all markets of one sport event.
    async fn recover_event_odds(
        &self,
        producer: Producer,
        event: &Urn,
        request_id: i64,
    ) -> Result<(), ApiError>;

    /// Request replay of stateful messages of one sport event.
    async fn recover_event_stateful(
        &self,
        producer: Producer,
        event: &Urn,
        request_id: i64,
    ) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        let status = |status| ApiError::Status {
            url: "u".into(),
            status,
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(status(408).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(ApiError::Timeout { url: "u".into() }.is_retryable());
        assert!(!ApiError::Cancelled { url: "u".into() }.is_retryable());
    }
}
