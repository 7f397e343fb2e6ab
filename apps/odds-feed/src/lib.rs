#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Odds Feed - Resilient Odds Feed Client
//!
//! Holds an exclusive subscription to the odds feed broker, replays missed
//! traffic through the recovery API and attaches reference data to every
//! event before handing it to application consumers, in order.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Feed events and reference records
//!   - `urn`: Entity identifiers
//!   - `message`: Decoded feed events, producers, watermarks
//!   - `reference`: Markets, fixtures, players, probabilities
//!
//! - **Application**: Pipeline and port definitions
//!   - `ports`: Recovery API, reference reads, reference cache
//!   - `pipeline`: Source/stage traits, composer, terminal consumers
//!   - `services`: Enrichment stages, recovery coordinator
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broker`: AMQP subscription, decoder, reconnect
//!   - `api`: Retrying HTTP client, replay control
//!   - `cache`: Unbounded and LRU caches
//!   - `config`: Environments and session configuration
//!
//! # Data Flow
//!
//! ```text
//! broker ──► subscriber ──► market ──► fixture ──► player ──► [recovery] ──► consumers
//!                 │            │          │           │            │             │
//!                 └────────────┴──────────┴───────────┴── faults ──┴─────────────┴──► caller
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Feed events and reference records.
pub mod domain;

/// Application layer - Pipeline, ports and stages.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Faults and the errors they carry.
pub mod error;

/// Composition root.
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{
    FeedEvent, Fixture, Lang, MarketDescription, MessageKind, Player, Probabilities, Producer,
    ProducerChange, Urn,
};

// Pipeline
pub use application::pipeline::{Consumer, ConsumerStage, FaultSink, FaultStream, Pipeline};

// Errors
pub use error::{Fault, FeedError, Severity};

// Configuration
pub use infrastructure::broker::BindMode;
pub use infrastructure::config::{CachePolicy, ConfigError, Credentials, Environment, FeedConfig};

// API
pub use infrastructure::api::{ApiClient, ReplayOptions};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

// Session
pub use session::Session;
