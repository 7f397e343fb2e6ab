//! Replay Control
//!
//! Drives the replay server: queue recorded events, start scenarios,
//! play, stop and reset. Every call is idempotent upstream (stopping a
//! stopped player is not an error). Production environments refuse replay
//! locally without sending a request.

use super::client::ApiClient;
use super::paths::{self, Params};
use crate::application::ports::ApiError;
use crate::domain::Urn;

/// Playback options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Playback speed multiplier.
    pub speed: u32,
    /// Longest pause between two messages, in ms.
    pub max_delay_ms: u32,
    /// Stamp messages with the recorded time instead of now.
    pub use_replay_timestamp: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            speed: 10,
            max_delay_ms: 10_000,
            use_replay_timestamp: false,
        }
    }
}

impl ReplayOptions {
    fn params(self) -> Params {
        Params::new()
            .with("speed", self.speed)
            .with("max_delay", self.max_delay_ms)
            .with("use_replay_timestamp", self.use_replay_timestamp)
    }
}

impl ApiClient {
    /// Start a predefined replay scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ReplayUnavailable`] in production, otherwise the
    /// API error if the request is not accepted.
    pub async fn start_scenario(
        &self,
        scenario_id: u32,
        options: ReplayOptions,
    ) -> Result<(), ApiError> {
        self.ensure_replay()?;
        let path = self.render(
            paths::REPLAY_SCENARIO,
            &options
                .params()
                .with("scenario", scenario_id)
                .with_node_id(self.node_id()),
        )?;
        self.post(&path).await.map(drop)
    }

    /// Reset the player, queue one event and start playing.
    ///
    /// # Errors
    ///
    /// Returns the first failing step.
    pub async fn start_event(&self, event: &Urn, options: ReplayOptions) -> Result<(), ApiError> {
        self.reset().await?;
        self.add(event).await?;
        self.play(options).await
    }

    /// Add an event to the replay queue.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ReplayUnavailable`] in production, otherwise the
    /// API error if the request is not accepted.
    pub async fn add(&self, event: &Urn) -> Result<(), ApiError> {
        self.ensure_replay()?;
        let path = self.render(paths::REPLAY_ADD, &Params::new().with("event", event))?;
        self.put(&path).await.map(drop)
    }

    /// Start playing the queue.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ReplayUnavailable`] in production, otherwise the
    /// API error if the request is not accepted.
    pub async fn play(&self, options: ReplayOptions) -> Result<(), ApiError> {
        self.ensure_replay()?;
        let path = self.render(
            paths::REPLAY_PLAY,
            &options.params().with_node_id(self.node_id()),
        )?;
        self.post(&path).await.map(drop)
    }

    /// Stop the player.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ReplayUnavailable`] in production, otherwise the
    /// API error if the request is not accepted.
    pub async fn stop(&self) -> Result<(), ApiError> {
        self.ensure_replay()?;
        self.post(paths::REPLAY_STOP).await.map(drop)
    }

    /// Stop the player and clear the queue.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ReplayUnavailable`] in production, otherwise the
    /// API error if the request is not accepted.
    pub async fn reset(&self) -> Result<(), ApiError> {
        self.ensure_replay()?;
        self.post(paths::REPLAY_RESET).await.map(drop)
    }

    fn ensure_replay(&self) -> Result<(), ApiError> {
        let environment = self.environment();
        if environment.is_production() {
            return Err(ApiError::ReplayUnavailable {
                environment: environment.as_str().to_string(),
            });
        }
        Ok(())
    }
}
