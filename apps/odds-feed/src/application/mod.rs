//! Application Layer - Ports, pipeline composition and stages.
//!
//! Depends on the domain only; adapters in the infrastructure layer
//! implement the ports declared here.

/// Port interfaces for the recovery API, reference reads and caching.
pub mod ports;

/// Pipeline composer, stage traits and terminal consumers.
pub mod pipeline;

/// Enrichment stages and the recovery coordinator.
pub mod services;
