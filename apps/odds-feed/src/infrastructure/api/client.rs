//! Recovery Client
//!
//! HTTP client for the recovery and reference API. Every request carries
//! the access token header, runs under a per-request deadline bounded by
//! the configured ceiling and the session's cancellation signal, and is
//! retried with capped exponential backoff on transient failures.
//!
//! A response is successful only with a 2xx status; anything else becomes
//! an [`ApiError::Status`] carrying URL, status and body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;

use super::paths::{self, Params};
use crate::application::ports::{ApiError, RecoveryPort, ReferenceData};
use crate::domain::reference::XmlError;
use crate::domain::{Fixture, Lang, MarketDescription, Player, Producer, Urn};
use crate::infrastructure::config::{Environment, FeedConfig};
use crate::infrastructure::metrics;

/// Header carrying the access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Retry policy for API requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound for a single wait.
    pub max_backoff: Duration,
    /// Growth factor between waits.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(16),
            multiplier: 2.0,
        }
    }
}

/// Backoff state for one request.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    const fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            current_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
        }
    }

    /// Wait before the next attempt, or `None` when attempts are exhausted.
    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current_backoff;
        self.current_backoff = Duration::from_secs_f64(
            (self.current_backoff.as_secs_f64() * self.multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );

        Some(backoff)
    }
}

/// Client for the recovery and reference API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
    environment: Environment,
    node_id: Option<i32>,
    retry: RetryConfig,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("node_id", &self.node_id)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client from the session configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &FeedConfig, cancel: CancellationToken) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url(),
            token: config.credentials().token().to_string(),
            environment: config.environment(),
            node_id: config.node_id(),
            retry: config.retry().clone(),
            request_timeout: config.request_timeout(),
            cancel,
        })
    }

    /// Configured environment.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Configured node id.
    #[must_use]
    pub const fn node_id(&self) -> Option<i32> {
        self.node_id
    }

    /// Verify the token against the API (`whoami`).
    ///
    /// # Errors
    ///
    /// Returns the API error if the token is rejected or the API is
    /// unreachable.
    pub async fn ping(&self) -> Result<(), ApiError> {
        self.get(paths::WHOAMI).await.map(drop)
    }

    // =========================================================================
    // Request Plumbing
    // =========================================================================

    pub(super) fn render(&self, template: &'static str, params: &Params) -> Result<String, ApiError> {
        paths::render(template, params).map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    pub(super) async fn get(&self, path: &str) -> Result<String, ApiError> {
        self.request(Method::GET, path).await
    }

    pub(super) async fn post(&self, path: &str) -> Result<String, ApiError> {
        self.request(Method::POST, path).await
    }

    pub(super) async fn put(&self, path: &str) -> Result<String, ApiError> {
        self.request(Method::PUT, path).await
    }

    pub(super) fn decode<T>(
        url: &str,
        body: &str,
        parse: impl FnOnce(&str) -> Result<T, XmlError>,
    ) -> Result<T, ApiError> {
        parse(body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn request(&self, method: Method, path: &str) -> Result<String, ApiError> {
        let url = self.url(path);
        let mut backoff = ExponentialBackoff::new(&self.retry);

        loop {
            let result = self.attempt(method.clone(), &url).await;
            match result {
                Ok(body) => {
                    metrics::record_api_request("ok");
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            %url,
                            error = %e,
                            attempt = backoff.attempt,
                            delay_ms = delay.as_millis(),
                            "API request failed, retrying"
                        );
                        metrics::record_api_retry();
                        tokio::select! {
                            () = self.cancel.cancelled() => {
                                return Err(ApiError::Cancelled { url });
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                        continue;
                    }
                    metrics::record_api_request(outcome(&e));
                    return Err(e);
                }
                Err(e) => {
                    metrics::record_api_request(outcome(&e));
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, method: Method, url: &str) -> Result<String, ApiError> {
        let call = async {
            let response = self
                .http
                .request(method, url)
                .header(ACCESS_TOKEN_HEADER, &self.token)
                .send()
                .await
                .map_err(|e| transport_error(url, &e))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| transport_error(url, &e))?;

            if status.is_success() {
                Ok(body)
            } else {
                Err(ApiError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
        };

        tokio::select! {
            () = self.cancel.cancelled() => Err(ApiError::Cancelled { url: url.to_string() }),
            result = tokio::time::timeout(self.request_timeout, call) => {
                result.unwrap_or_else(|_| Err(ApiError::Timeout { url: url.to_string() }))
            }
        }
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout {
            url: url.to_string(),
        }
    } else {
        ApiError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

const fn outcome(e: &ApiError) -> &'static str {
    match e {
        ApiError::Status { .. } => "status",
        ApiError::Timeout { .. } => "timeout",
        ApiError::Cancelled { .. } => "cancelled",
        ApiError::Transport { .. } => "transport",
        ApiError::Decode { .. } | ApiError::InvalidRequest(_) | ApiError::ReplayUnavailable { .. } => {
            "invalid"
        }
    }
}

// =============================================================================
// Port Implementations
// =============================================================================

#[async_trait]
impl RecoveryPort for ApiClient {
    async fn request_recovery(
        &self,
        producer: Producer,
        timestamp: i64,
        request_id: i64,
    ) -> Result<(), ApiError> {
        let path = paths::recovery_path(producer.id(), timestamp, request_id, self.node_id)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.post(&path).await.map(drop)
    }

    async fn recover_event_odds(
        &self,
        producer: Producer,
        event: &Urn,
        request_id: i64,
    ) -> Result<(), ApiError> {
        let path = self.render(
            paths::RECOVERY_EVENT_ODDS,
            &Params::new()
                .with("producer", producer.id())
                .with("event", event)
                .with("request_id", request_id)
                .with("node_id", self.node_id.unwrap_or(0)),
        )?;
        self.post(&path).await.map(drop)
    }

    async fn recover_event_stateful(
        &self,
        producer: Producer,
        event: &Urn,
        request_id: i64,
    ) -> Result<(), ApiError> {
        let path = self.render(
            paths::RECOVERY_EVENT_STATEFUL,
            &Params::new()
                .with("producer", producer.id())
                .with("event", event)
                .with("request_id", request_id)
                .with("node_id", self.node_id.unwrap_or(0)),
        )?;
        self.post(&path).await.map(drop)
    }
}

#[async_trait]
impl ReferenceData for ApiClient {
    async fn markets(&self, lang: &Lang) -> Result<Vec<MarketDescription>, ApiError> {
        let path = self.render(paths::MARKETS, &Params::new().with("lang", lang))?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, MarketDescription::list_from_xml)
    }

    async fn market_variant(
        &self,
        lang: &Lang,
        market_id: u32,
        variant: &str,
    ) -> Result<Vec<MarketDescription>, ApiError> {
        let path = self.render(
            paths::MARKET_VARIANT,
            &Params::new()
                .with("lang", lang)
                .with("market", market_id)
                .with("variant", variant),
        )?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, MarketDescription::list_from_xml)
    }

    async fn fixture(&self, lang: &Lang, event: &Urn) -> Result<Fixture, ApiError> {
        let path = self.render(
            paths::FIXTURE,
            &Params::new().with("lang", lang).with("event", event),
        )?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, Fixture::from_xml)
    }

    async fn player(&self, lang: &Lang, player_id: u64) -> Result<Player, ApiError> {
        let path = self.render(
            paths::PLAYER,
            &Params::new().with("lang", lang).with("player", player_id),
        )?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, Player::from_xml)
    }

    async fn live_schedule(&self, lang: &Lang) -> Result<Vec<Fixture>, ApiError> {
        let path = self.render(paths::SCHEDULE_LIVE, &Params::new().with("lang", lang))?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, Fixture::list_from_schedule_xml)
    }

    async fn schedule(
        &self,
        lang: &Lang,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Fixture>, ApiError> {
        let path = self.render(
            paths::SCHEDULE_PRE,
            &Params::new()
                .with("lang", lang)
                .with("start", start)
                .with("limit", limit),
        )?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, Fixture::list_from_schedule_xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_allows_exactly_max_attempts() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
            multiplier: 2.0,
        };
        let mut backoff = ExponentialBackoff::new(&config);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(250)));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome(&ApiError::Timeout { url: String::new() }), "timeout");
        assert_eq!(
            outcome(&ApiError::Status {
                url: String::new(),
                status: 500,
                body: String::new()
            }),
            "status"
        );
    }
}
