//! Application Services
//!
//! Pipeline stages with feed-specific behavior.
//!
//! - `enrichment`: attach market, fixture and player reference data
//! - `recovery`: issue startup recovery requests and track their completion

/// Reference-data enrichment stages.
pub mod enrichment;

/// Recovery coordinator.
pub mod recovery;

pub use enrichment::{
    Enricher, EnrichmentStage, FixtureEnricher, MarketEnricher, MarketKey, PlayerEnricher,
};
pub use recovery::{DEFAULT_REQUEST_TTL, RecoveryCoordinator, RecoveryKind, RequestIds};
