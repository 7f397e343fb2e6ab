//! Recovery and Reference API
//!
//! Templated, retrying HTTP client for recovery requests, reference-data
//! reads, probabilities and replay control.

/// Retrying HTTP client and port implementations.
pub mod client;

/// Request path templates.
pub mod paths;

mod probabilities;
mod replay;

pub use client::{ACCESS_TOKEN_HEADER, ApiClient, RetryConfig};
pub use replay::ReplayOptions;
