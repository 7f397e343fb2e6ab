//! Prometheus Metrics Module
//!
//! Exposes feed metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Messages**: deliveries received by kind, decode failures
//! - **Connections**: broker redials
//! - **API**: requests by outcome, retries, recovery requests
//! - **Enrichment**: cache hits and misses per stage
//! - **Faults**: faults by severity
//!
//! When no listener port is configured no recorder is installed and every
//! recording function is a no-op.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::MessageKind;
use crate::error::Severity;

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus exporter with an HTTP listener on `port`.
///
/// Port 0 disables the exporter. Must be called from within a tokio
/// runtime. Later calls are no-ops.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if port == 0 || INSTALLED.get().is_some() {
        return Ok(());
    }
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    let _ = INSTALLED.set(addr);
    register_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "odds_feed_messages_received_total",
        "Feed messages decoded, by kind"
    );
    describe_counter!(
        "odds_feed_decode_errors_total",
        "Deliveries dropped because they could not be decoded"
    );
    describe_counter!("odds_feed_reconnects_total", "Broker redial attempts");
    describe_counter!(
        "odds_feed_api_requests_total",
        "API requests by outcome"
    );
    describe_counter!("odds_feed_api_retries_total", "API request retries");
    describe_counter!(
        "odds_feed_recovery_requests_total",
        "Recovery requests by outcome"
    );
    describe_counter!(
        "odds_feed_cache_lookups_total",
        "Reference cache lookups by stage and result"
    );
    describe_counter!("odds_feed_faults_total", "Pipeline faults by severity");
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a decoded message.
pub fn record_message_received(kind: MessageKind) {
    counter!("odds_feed_messages_received_total", "kind" => kind.as_str()).increment(1);
}

/// Record a dropped delivery.
pub fn record_decode_error() {
    counter!("odds_feed_decode_errors_total").increment(1);
}

/// Record a broker redial attempt.
pub fn record_reconnect() {
    counter!("odds_feed_reconnects_total").increment(1);
}

/// Record a finished API request (`ok`, `status`, `timeout`, ...).
pub fn record_api_request(outcome: &'static str) {
    counter!("odds_feed_api_requests_total", "outcome" => outcome).increment(1);
}

/// Record an API retry.
pub fn record_api_retry() {
    counter!("odds_feed_api_retries_total").increment(1);
}

/// Record a recovery request submission.
pub fn record_recovery_request(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "failed" };
    counter!("odds_feed_recovery_requests_total", "outcome" => outcome).increment(1);
}

/// Record a reference cache lookup.
pub fn record_cache_lookup(stage: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("odds_feed_cache_lookups_total", "stage" => stage, "result" => result).increment(1);
}

/// Record a pipeline fault.
pub fn record_fault(severity: Severity) {
    let severity = match severity {
        Severity::Advisory => "advisory",
        Severity::Fatal => "fatal",
    };
    counter!("odds_feed_faults_total", "severity" => severity).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
