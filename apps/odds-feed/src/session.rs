//! Feed Session
//!
//! Composition root. Starting a session checks the API token, makes the
//! first broker dial and wires the standard pipeline:
//!
//! ```text
//! subscriber ─► market ─► fixture ─► player ─► [recovery] ─► consumers
//! ```
//!
//! The recovery coordinator is only added when watermarks are configured.
//! With a fixture preload horizon, the fixture stage fills its cache from
//! the schedule endpoints before it takes the first event.
//! Startup failures are returned directly; once running, every failure is
//! a fault on the session's fault stream.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::pipeline::{FaultStream, Pipeline, Stage};
use crate::application::services::{
    EnrichmentStage, FixtureEnricher, MarketEnricher, PlayerEnricher, RecoveryCoordinator,
    RequestIds,
};
use crate::error::{Fault, FeedError};
use crate::infrastructure::api::ApiClient;
use crate::infrastructure::broker::{AmqpDialer, Dialer, ResilientSubscriber};
use crate::infrastructure::cache::cache_for;
use crate::infrastructure::config::FeedConfig;

/// Running feed pipeline.
#[derive(Debug)]
pub struct Session {
    api: ApiClient,
    faults: FaultStream,
    cancel: CancellationToken,
}

impl Session {
    /// Start a session against the configured broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the token or the first dial
    /// fails.
    pub async fn start(
        config: &FeedConfig,
        consumers: Vec<Box<dyn Stage>>,
        cancel: CancellationToken,
    ) -> Result<Self, FeedError> {
        Self::start_with(config, AmqpDialer::new(config), consumers, cancel).await
    }

    /// Start a session with a custom dialer.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the token or the first dial
    /// fails.
    pub async fn start_with<D: Dialer + 'static>(
        config: &FeedConfig,
        dialer: D,
        consumers: Vec<Box<dyn Stage>>,
        cancel: CancellationToken,
    ) -> Result<Self, FeedError> {
        let api = ApiClient::new(config, cancel.clone())?;
        api.ping().await?;
        tracing::info!(
            environment = config.environment().as_str(),
            bookmaker_id = config.credentials().bookmaker_id(),
            "API token accepted"
        );

        let connection = dialer.dial(cancel.child_token()).await?;
        let subscriber =
            ResilientSubscriber::new(dialer, config.reconnect().clone()).with_connection(connection);

        let reference = Arc::new(api.clone());
        let languages = config.languages().to_vec();

        let mut pipeline = Pipeline::new(subscriber, cancel.clone())
            .capacity(config.channel_capacity())
            .stage(EnrichmentStage::new(
                MarketEnricher::new(reference.clone()),
                languages.clone(),
                cache_for(config.cache()),
            ))
            .stage(EnrichmentStage::new(
                FixtureEnricher::new(reference.clone()).preload_until(config.fixture_preload()),
                languages.clone(),
                cache_for(config.cache()),
            ))
            .stage(EnrichmentStage::new(
                PlayerEnricher::new(reference.clone()),
                languages,
                cache_for(config.cache()),
            ));

        if !config.recovery().is_empty() {
            pipeline = pipeline.stage(RecoveryCoordinator::new(
                reference,
                config.recovery().to_vec(),
                Arc::new(RequestIds::seeded()),
            ));
        }
        for consumer in consumers {
            pipeline = pipeline.boxed_stage(consumer);
        }

        tracing::info!(
            languages = ?config.languages(),
            producers = config.recovery().len(),
            "Feed session started"
        );

        Ok(Self {
            api,
            faults: pipeline.build(),
            cancel,
        })
    }

    /// API client for replay control, probabilities and event recovery.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Merged fault stream.
    pub const fn faults(&mut self) -> &mut FaultStream {
        &mut self.faults
    }

    /// Stop the pipeline.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run until every stage has exited.
    ///
    /// Advisory faults are already logged where they are reported and are
    /// skipped here. A fatal fault stops the pipeline; this still waits
    /// for the remaining stages to drain before returning.
    ///
    /// # Errors
    ///
    /// Returns the first fatal fault.
    pub async fn run(mut self) -> Result<(), Fault> {
        let mut fatal = None;
        while let Some(fault) = self.faults.recv().await {
            if fault.is_fatal() && fatal.is_none() {
                self.cancel.cancel();
                fatal = Some(fault);
            }
        }
        fatal.map_or(Ok(()), Err)
    }
}
