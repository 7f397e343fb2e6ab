//! Pipeline Faults
//!
//! Every stage reports failures on one merged fault stream. A [`Fault`]
//! wraps a [`FeedError`] with the reporting stage and its severity. Only
//! terminal consumer failures are fatal; everything else is advisory and
//! the pipeline keeps running.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::application::ports::ApiError;
use crate::domain::{Lang, Producer};
use crate::infrastructure::broker::codec::DecodeError;
use crate::infrastructure::broker::connection::DialError;

/// Errors surfaced by the feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Broker dial attempt failed.
    #[error(transparent)]
    Dial(#[from] DialError),

    /// Delivery could not be decoded; the delivery was dropped.
    #[error("decode failed for {routing_key:?}: {source}")]
    Decode {
        /// Routing key of the dropped delivery.
        routing_key: String,
        /// Decoder error.
        #[source]
        source: DecodeError,
    },

    /// API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Recovery request for a producer could not be submitted.
    #[error("recovery for producer {producer} failed: {source}")]
    Recovery {
        /// Producer being recovered.
        producer: Producer,
        /// API error.
        #[source]
        source: ApiError,
    },

    /// Reference lookup failed; the event continued without it.
    #[error("{stage} lookup of {key} [{lang}] failed: {source}")]
    Enrichment {
        /// Enrichment stage name.
        stage: &'static str,
        /// Identifier looked up.
        key: String,
        /// Lookup language.
        lang: Lang,
        /// API error.
        #[source]
        source: ApiError,
    },

    /// Broker link was lost; a redial follows.
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),

    /// Terminal consumer failed.
    #[error("consumer failed: {0}")]
    Consumer(#[source] anyhow::Error),
}

/// How a fault affects the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational; the pipeline keeps running.
    Advisory,
    /// The pipeline is shutting down.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advisory => f.write_str("advisory"),
            Self::Fatal => f.write_str("fatal"),
        }
    }
}

/// A failure reported by one stage.
#[derive(Debug)]
pub struct Fault {
    /// Name of the reporting stage.
    pub stage: &'static str,
    /// Severity.
    pub severity: Severity,
    /// Underlying error.
    pub error: FeedError,
    /// Time the fault was reported.
    pub at: DateTime<Utc>,
}

impl Fault {
    /// Advisory fault.
    #[must_use]
    pub fn advisory(stage: &'static str, error: impl Into<FeedError>) -> Self {
        Self {
            stage,
            severity: Severity::Advisory,
            error: error.into(),
            at: Utc::now(),
        }
    }

    /// Fatal fault.
    #[must_use]
    pub fn fatal(stage: &'static str, error: impl Into<FeedError>) -> Self {
        Self {
            stage,
            severity: Severity::Fatal,
            error: error.into(),
            at: Utc::now(),
        }
    }

    /// True for fatal faults.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.stage, self.error)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
