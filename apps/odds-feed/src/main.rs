//! Odds Feed Binary
//!
//! Subscribes to the odds feed and logs every enriched event.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin odds-feed
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `UOF_BOOKMAKER_ID`: Bookmaker id
//! - `UOF_TOKEN`: Access token
//!
//! ## Optional
//! - `UOF_ENV`: replay | staging | production | production-global (default: production)
//! - `UOF_BIND`: all | virtuals | sports | prematch | live (default: all)
//! - `UOF_LANGUAGES`: Comma separated languages (default: en,de)
//! - `UOF_NODE_ID`: Node id for recovery routing
//! - `UOF_RECOVERY`: Watermarks as `producer:timestamp,...`
//! - `UOF_REQUEST_TIMEOUT_SECS`: API request timeout (default: 32)
//! - `UOF_CHANNEL_CAPACITY`: Pipeline link capacity (default: 1024)
//! - `UOF_CACHE_CAPACITY`: LRU capacity per enrichment stage (default: unbounded)
//! - `UOF_METRICS_PORT`: Prometheus metrics port (default: disabled)
//! - `UOF_PRELOAD_FIXTURES_HOURS`: Preload fixtures of events starting within this many hours
//! - `UOF_REPLAY_EVENT`: Event to replay in the replay environment
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name on exported spans (default: odds-feed)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::Context;
use odds_feed::application::pipeline::{ConsumerStage, Stage};
use odds_feed::infrastructure::telemetry;
use odds_feed::{
    Environment, FeedConfig, FeedEvent, ReplayOptions, Session, Urn, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("rustls crypto provider already installed"))?;

    load_dotenv();

    let config = FeedConfig::from_env().context("feed configuration")?;

    let _telemetry_guard = telemetry::init(config.telemetry());

    tracing::info!("Starting odds feed");
    log_config(&config);

    init_metrics(config.metrics_port()).context("metrics exporter")?;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let consumers: Vec<Box<dyn Stage>> = vec![Box::new(ConsumerStage::new("log", log_event))];
    let session = Session::start(&config, consumers, shutdown_token.clone()).await?;

    if config.environment() == Environment::Replay
        && let Ok(event) = std::env::var("UOF_REPLAY_EVENT")
    {
        let urn: Urn = event.parse()?;
        session
            .api()
            .start_event(&urn, ReplayOptions::default())
            .await?;
        tracing::info!(event = %urn, "Replay started");
    }

    tracing::info!("Odds feed ready");

    if let Err(fault) = session.run().await {
        tracing::error!(stage = fault.stage, error = %fault.error, "Odds feed stopped on fatal fault");
        return Err(fault.into());
    }

    tracing::info!("Odds feed stopped");
    Ok(())
}

/// Log one event with its fixture, when known.
#[allow(clippy::unnecessary_wraps)]
fn log_event(event: &FeedEvent) -> anyhow::Result<()> {
    let fixture = event
        .annotations()
        .fixtures()
        .first()
        .map(|f| f.value.display_name());
    tracing::info!(
        kind = %event.kind(),
        producer = %event.producer(),
        event = ?event.event_urn().map(ToString::to_string),
        fixture = ?fixture,
        markets = event.markets().len(),
        request_id = ?event.request_id(),
        "Feed event"
    );
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        environment = config.environment().as_str(),
        bind = %config.bind_mode(),
        languages = ?config.languages(),
        node_id = ?config.node_id(),
        producers = config.recovery().len(),
        fixture_preload = ?config.fixture_preload(),
        otlp = config.telemetry().enabled,
        metrics_port = config.metrics_port(),
        "Configuration loaded"
    );
    tracing::debug!(api = %config.api_base_url(), "API endpoint");
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
