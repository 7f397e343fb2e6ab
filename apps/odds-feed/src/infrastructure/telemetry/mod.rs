//! Tracing Setup and Feed Spans
//!
//! Installs the process-wide subscriber: an env-filtered fmt layer, plus an
//! OTLP exporter layer when the feed configuration enables one. The span
//! constructors below are the ones the feed's own work runs under, so a
//! trace shows each broker dial, each recovery request and the enrichment
//! of every event.
//!
//! Telemetry settings are part of [`FeedConfig`](crate::FeedConfig) and
//! load with it:
//!
//! - `OTEL_ENABLED`: `false` keeps logging on stdout only (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: service name on exported spans (default: odds-feed)
//! - `RUST_LOG`: extra filter directives on top of the defaults

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::Span;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::{FeedEvent, Producer};

/// Service name on exported spans.
pub const DEFAULT_SERVICE_NAME: &str = "odds-feed";

/// Collector endpoint.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Filter applied before `RUST_LOG`. Broker and HTTP internals are noisy
/// at info.
const DEFAULT_DIRECTIVES: &[&str] = &["odds_feed=info", "lapin=warn", "reqwest=warn", "hyper=warn"];

/// Span export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Export spans over OTLP.
    pub enabled: bool,
    /// Collector endpoint.
    pub otlp_endpoint: String,
    /// Service name on exported spans.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Stdout logging only.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Flushes exported spans when dropped.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are exported.
    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to flush exported spans: {e}");
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the process. When the
/// exporter cannot be built the feed still logs to stdout and the failure
/// is logged once.
#[must_use]
pub fn init(config: &TelemetryConfig) -> TelemetryGuard {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let (provider, export_error) = if config.enabled {
        match tracer_provider(config) {
            Ok(provider) => (Some(provider), None),
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    match export_error {
        Some(e) => tracing::warn!(error = %e, "OTLP exporter unavailable, logging to stdout only"),
        None if provider.is_some() => {
            tracing::info!(endpoint = %config.otlp_endpoint, "Exporting spans over OTLP");
        }
        None => {}
    }

    TelemetryGuard { provider }
}

fn env_filter() -> EnvFilter {
    DEFAULT_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}

fn tracer_provider(
    config: &TelemetryConfig,
) -> Result<SdkTracerProvider, opentelemetry_otlp::ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build())
}

// =============================================================================
// Feed Spans
// =============================================================================

/// One broker dial.
#[must_use]
pub fn dial_span(bindings: usize) -> Span {
    tracing::info_span!("feed.dial", bindings)
}

/// One recovery request, from submission to acceptance.
#[must_use]
pub fn recovery_span(producer: Producer, request_id: i64, full: bool) -> Span {
    tracing::info_span!("feed.recovery", %producer, request_id, full)
}

/// Enrichment of one event by one stage.
#[must_use]
pub fn enrich_span(stage: &'static str, event: &FeedEvent) -> Span {
    tracing::debug_span!(
        "feed.enrich",
        stage,
        kind = %event.kind(),
        event = event.event_urn().map(tracing::field::display),
    )
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::Registry;

    use super::*;
    use crate::domain::{EventHeader, MessageKind, Priority, Scope};

    #[test]
    fn export_is_on_by_default() {
        let config = TelemetryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.otlp_endpoint, DEFAULT_OTLP_ENDPOINT);
        assert_eq!(config.service_name, "odds-feed");
        assert!(!TelemetryConfig::disabled().enabled);
    }

    #[test]
    fn default_directives_parse() {
        for directive in DEFAULT_DIRECTIVES {
            assert!(
                directive.parse::<tracing_subscriber::filter::Directive>().is_ok(),
                "{directive}"
            );
        }
    }

    #[test]
    fn guard_without_provider_is_not_exporting() {
        let guard = TelemetryGuard { provider: None };
        assert!(!guard.is_exporting());
    }

    #[test]
    fn feed_spans_are_named() {
        let header = EventHeader {
            kind: MessageKind::OddsChange,
            priority: Priority::High,
            scope: Scope::Live,
            producer: Producer(1),
            event_urn: Some("sr:match:1".parse().unwrap()),
            sport_id: Some(1),
            node_id: None,
            timestamp: 1,
            request_id: None,
        };
        let event = FeedEvent::new(header, Vec::new(), "hi.-.live.odds_change.1.sr:match.1.-", Vec::new());

        tracing::subscriber::with_default(Registry::default(), || {
            let names: Vec<_> = [
                dial_span(3),
                recovery_span(Producer(1), 7, true),
                enrich_span("market", &event),
            ]
            .iter()
            .map(|s| s.metadata().map(tracing::Metadata::name))
            .collect();
            assert_eq!(
                names,
                vec![Some("feed.dial"), Some("feed.recovery"), Some("feed.enrich")]
            );
        });
    }
}
