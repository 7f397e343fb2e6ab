//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the ports declared in the application
//! layer, plus the broker source and process-wide observability.

/// Recovery and reference API client.
pub mod api;

/// AMQP subscription, decoding and reconnect.
pub mod broker;

/// Reference cache adapters.
pub mod cache;

/// Environment hosts, credentials and session configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
