//! Feed Configuration Settings
//!
//! Immutable configuration for one feed session, filled by a builder or
//! loaded from environment variables.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{Lang, Producer, ProducerChange};
use crate::infrastructure::api::client::RetryConfig;
use crate::infrastructure::broker::bindings::BindMode;
use crate::infrastructure::broker::reconnect::ReconnectConfig;
use crate::infrastructure::telemetry::TelemetryConfig;

/// Default per-request timeout ceiling.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(32);

/// Default capacity of every pipeline channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default enrichment languages.
pub const DEFAULT_LANGUAGES: &str = "en,de";

/// Feed environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Replay server for recorded events.
    Replay,
    /// Integration environment.
    Staging,
    /// Production.
    #[default]
    Production,
    /// Production, global endpoints.
    ProductionGlobal,
}

impl Environment {
    /// Parse an environment name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownEnvironment`] for unknown names.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "replay" => Ok(Self::Replay),
            "staging" | "integration" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            "production-global" | "global" => Ok(Self::ProductionGlobal),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }

    /// Environment name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::ProductionGlobal => "production-global",
        }
    }

    /// Broker `host:port`.
    #[must_use]
    pub const fn broker_address(self) -> &'static str {
        match self {
            Self::Replay => "replaymq.betradar.com:5671",
            Self::Staging => "stgmq.betradar.com:5671",
            Self::Production => "mq.betradar.com:5671",
            Self::ProductionGlobal => "global.mq.betradar.com:5671",
        }
    }

    /// API host.
    #[must_use]
    pub const fn api_host(self) -> &'static str {
        match self {
            Self::Replay | Self::Production => "api.betradar.com",
            Self::Staging => "stgapi.betradar.com",
            Self::ProductionGlobal => "global.api.betradar.com",
        }
    }

    /// Production environments refuse replay control.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production | Self::ProductionGlobal)
    }
}

/// Bookmaker credentials.
#[derive(Clone)]
pub struct Credentials {
    bookmaker_id: String,
    token: String,
}

impl Credentials {
    /// Create credentials.
    #[must_use]
    pub fn new(bookmaker_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            bookmaker_id: bookmaker_id.into(),
            token: token.into(),
        }
    }

    /// Bookmaker id, used as broker virtual host suffix.
    #[must_use]
    pub fn bookmaker_id(&self) -> &str {
        &self.bookmaker_id
    }

    /// Access token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bookmaker_id", &self.bookmaker_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Reference cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Never evict.
    #[default]
    Unbounded,
    /// Least-recently-used with a fixed capacity per stage.
    Lru(usize),
}

/// Complete feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    credentials: Credentials,
    environment: Environment,
    bind_mode: BindMode,
    languages: Vec<Lang>,
    node_id: Option<i32>,
    recovery: Vec<ProducerChange>,
    reconnect: ReconnectConfig,
    retry: RetryConfig,
    request_timeout: Duration,
    channel_capacity: usize,
    cache: CachePolicy,
    api_base_url: Option<String>,
    metrics_port: u16,
    fixture_preload: Option<DateTime<Utc>>,
    telemetry: TelemetryConfig,
}

impl FeedConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder(credentials: Credentials) -> FeedConfigBuilder {
        FeedConfigBuilder::new(credentials)
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or a value is
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bookmaker_id = require_env("UOF_BOOKMAKER_ID")?;
        let token = require_env("UOF_TOKEN")?;

        let mut builder = Self::builder(Credentials::new(bookmaker_id, token));

        if let Some(env) = optional_env("UOF_ENV") {
            builder = builder.environment(Environment::parse(&env)?);
        }
        if let Some(mode) = optional_env("UOF_BIND") {
            let mode = mode.parse().map_err(ConfigError::UnknownBindMode)?;
            builder = builder.bind_mode(mode);
        }
        if let Some(langs) = optional_env("UOF_LANGUAGES") {
            let langs = Lang::parse_list(&langs).map_err(|e| ConfigError::InvalidValue {
                key: "UOF_LANGUAGES",
                message: e.to_string(),
            })?;
            builder = builder.languages(langs);
        }
        if let Some(node_id) = optional_env("UOF_NODE_ID") {
            builder = builder.node_id(parse_value("UOF_NODE_ID", &node_id)?);
        }
        if let Some(recovery) = optional_env("UOF_RECOVERY") {
            for change in parse_recovery_list(&recovery)? {
                builder = builder.recover(change.producer, change.timestamp);
            }
        }
        if let Some(secs) = optional_env("UOF_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_value("UOF_REQUEST_TIMEOUT_SECS", &secs)?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(capacity) = optional_env("UOF_CHANNEL_CAPACITY") {
            builder = builder.channel_capacity(parse_value("UOF_CHANNEL_CAPACITY", &capacity)?);
        }
        if let Some(capacity) = optional_env("UOF_CACHE_CAPACITY") {
            builder = builder.cache(CachePolicy::Lru(parse_value(
                "UOF_CACHE_CAPACITY",
                &capacity,
            )?));
        }
        if let Some(port) = optional_env("UOF_METRICS_PORT") {
            builder = builder.metrics_port(parse_value("UOF_METRICS_PORT", &port)?);
        }
        if let Some(hours) = optional_env("UOF_PRELOAD_FIXTURES_HOURS") {
            let hours: u32 = parse_value("UOF_PRELOAD_FIXTURES_HOURS", &hours)?;
            builder = builder.preload_fixtures(Utc::now() + chrono::Duration::hours(i64::from(hours)));
        }

        builder = builder.telemetry(telemetry_from_env()?);

        builder.build()
    }

    /// Credentials.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Environment.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Subscription mode.
    #[must_use]
    pub const fn bind_mode(&self) -> BindMode {
        self.bind_mode
    }

    /// Enrichment languages, never empty.
    #[must_use]
    pub fn languages(&self) -> &[Lang] {
        &self.languages
    }

    /// Node id for routing recovered messages, if configured.
    #[must_use]
    pub const fn node_id(&self) -> Option<i32> {
        self.node_id
    }

    /// Startup watermarks.
    #[must_use]
    pub fn recovery(&self) -> &[ProducerChange] {
        &self.recovery
    }

    /// Redial backoff.
    #[must_use]
    pub const fn reconnect(&self) -> &ReconnectConfig {
        &self.reconnect
    }

    /// HTTP retry policy.
    #[must_use]
    pub const fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Per-request timeout ceiling.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Pipeline channel capacity.
    #[must_use]
    pub const fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Reference cache policy.
    #[must_use]
    pub const fn cache(&self) -> CachePolicy {
        self.cache
    }

    /// Prometheus listener port (0 = disabled).
    #[must_use]
    pub const fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    /// Preload fixtures of events starting before this time.
    #[must_use]
    pub const fn fixture_preload(&self) -> Option<DateTime<Utc>> {
        self.fixture_preload
    }

    /// Span export settings.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryConfig {
        &self.telemetry
    }

    /// AMQP URI for the broker.
    #[must_use]
    pub fn broker_uri(&self) -> String {
        format!(
            "amqps://{}:@{}//unifiedfeed/{}",
            self.credentials.token,
            self.environment.broker_address(),
            self.credentials.bookmaker_id
        )
    }

    /// Base URL of the API, without trailing slash.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        self.api_base_url.as_ref().map_or_else(
            || format!("https://{}", self.environment.api_host()),
            |url| url.trim_end_matches('/').to_string(),
        )
    }
}

/// Builder for [`FeedConfig`].
#[derive(Debug, Clone)]
pub struct FeedConfigBuilder {
    config: FeedConfig,
}

impl FeedConfigBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            config: FeedConfig {
                credentials,
                environment: Environment::default(),
                bind_mode: BindMode::default(),
                languages: Lang::parse_list(DEFAULT_LANGUAGES).unwrap_or_default(),
                node_id: None,
                recovery: Vec::new(),
                reconnect: ReconnectConfig::default(),
                retry: RetryConfig::default(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
                channel_capacity: DEFAULT_CHANNEL_CAPACITY,
                cache: CachePolicy::default(),
                api_base_url: None,
                metrics_port: 0,
                fixture_preload: None,
                telemetry: TelemetryConfig::default(),
            },
        }
    }

    /// Feed environment.
    #[must_use]
    pub const fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    /// Subscription mode.
    #[must_use]
    pub const fn bind_mode(mut self, mode: BindMode) -> Self {
        self.config.bind_mode = mode;
        self
    }

    /// Enrichment languages, replacing the defaults.
    #[must_use]
    pub fn languages(mut self, languages: Vec<Lang>) -> Self {
        self.config.languages = languages;
        self
    }

    /// Node id; zero clears it.
    #[must_use]
    pub const fn node_id(mut self, node_id: i32) -> Self {
        self.config.node_id = if node_id == 0 { None } else { Some(node_id) };
        self
    }

    /// Add a startup watermark; a later entry for the same producer wins.
    #[must_use]
    pub fn recover(mut self, producer: Producer, timestamp: i64) -> Self {
        self.config.recovery.retain(|c| c.producer != producer);
        self.config
            .recovery
            .push(ProducerChange::new(producer, timestamp));
        self
    }

    /// Redial backoff.
    #[must_use]
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// HTTP retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Per-request timeout ceiling.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Pipeline channel capacity.
    #[must_use]
    pub const fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Reference cache policy.
    #[must_use]
    pub const fn cache(mut self, policy: CachePolicy) -> Self {
        self.config.cache = policy;
        self
    }

    /// Override the API base URL.
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = Some(url.into());
        self
    }

    /// Prometheus listener port.
    #[must_use]
    pub const fn metrics_port(mut self, port: u16) -> Self {
        self.config.metrics_port = port;
        self
    }

    /// Fetch fixtures of every live event and every event scheduled
    /// before `until` at startup.
    #[must_use]
    pub const fn preload_fixtures(mut self, until: DateTime<Utc>) -> Self {
        self.config.fixture_preload = Some(until);
        self
    }

    /// Span export settings.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for empty credentials, no languages, or zero
    /// capacities.
    pub fn build(self) -> Result<FeedConfig, ConfigError> {
        let config = self.config;
        if config.credentials.bookmaker_id.is_empty() {
            return Err(ConfigError::EmptyValue("bookmaker_id".to_string()));
        }
        if config.credentials.token.is_empty() {
            return Err(ConfigError::EmptyValue("token".to_string()));
        }
        if config.languages.is_empty() {
            return Err(ConfigError::EmptyValue("languages".to_string()));
        }
        if config.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "channel_capacity",
                message: "must be greater than zero".to_string(),
            });
        }
        if config.telemetry.enabled && config.telemetry.otlp_endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyValue("otlp_endpoint".to_string()));
        }
        if config.cache == CachePolicy::Lru(0) {
            return Err(ConfigError::InvalidValue {
                key: "cache_capacity",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(config)
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Value is empty.
    #[error("{0} cannot be empty")]
    EmptyValue(String),
    /// Unknown environment name.
    #[error("unknown environment: {0:?}")]
    UnknownEnvironment(String),
    /// Unknown subscription mode.
    #[error("unknown bind mode: {0:?}")]
    UnknownBindMode(String),
    /// Malformed value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Error details.
        message: String,
    },
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn telemetry_from_env() -> Result<TelemetryConfig, ConfigError> {
    let mut telemetry = TelemetryConfig::default();
    if let Some(enabled) = optional_env("OTEL_ENABLED") {
        telemetry.enabled = parse_value("OTEL_ENABLED", &enabled.to_lowercase())?;
    }
    if let Some(endpoint) = optional_env("OTEL_EXPORTER_OTLP_ENDPOINT") {
        telemetry.otlp_endpoint = endpoint;
    }
    if let Some(name) = optional_env("OTEL_SERVICE_NAME") {
        telemetry.service_name = name;
    }
    Ok(telemetry)
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        message: e.to_string(),
    })
}

/// Parse `producer:timestamp` pairs separated by commas.
fn parse_recovery_list(s: &str) -> Result<Vec<ProducerChange>, ConfigError> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (producer, timestamp) =
                entry.split_once(':').ok_or_else(|| ConfigError::InvalidValue {
                    key: "UOF_RECOVERY",
                    message: format!("expected producer:timestamp, got {entry:?}"),
                })?;
            Ok(ProducerChange::new(
                Producer(parse_value("UOF_RECOVERY", producer)?),
                parse_value("UOF_RECOVERY", timestamp)?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("12345", "secret-token")
    }

    #[test]
    fn defaults() {
        let config = FeedConfig::builder(credentials()).build().unwrap();
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(config.bind_mode(), BindMode::All);
        let langs: Vec<_> = config.languages().iter().map(Lang::as_str).collect();
        assert_eq!(langs, vec!["en", "de"]);
        assert_eq!(config.node_id(), None);
        assert_eq!(config.request_timeout(), Duration::from_secs(32));
        assert_eq!(config.channel_capacity(), 1024);
        assert_eq!(config.cache(), CachePolicy::Unbounded);
        assert_eq!(config.api_base_url(), "https://api.betradar.com");
    }

    #[test]
    fn broker_uri_uses_token_and_bookmaker() {
        let config = FeedConfig::builder(credentials())
            .environment(Environment::Staging)
            .build()
            .unwrap();
        assert_eq!(
            config.broker_uri(),
            "amqps://secret-token:@stgmq.betradar.com:5671//unifiedfeed/12345"
        );
        assert_eq!(config.api_base_url(), "https://stgapi.betradar.com");
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(Environment::parse("Replay"), Ok(Environment::Replay));
        assert_eq!(
            Environment::parse("production_global"),
            Ok(Environment::ProductionGlobal)
        );
        assert_eq!(
            Environment::parse("moon"),
            Err(ConfigError::UnknownEnvironment("moon".to_string()))
        );
        assert!(Environment::ProductionGlobal.is_production());
        assert!(!Environment::Replay.is_production());
    }

    #[test]
    fn node_id_zero_means_none() {
        let config = FeedConfig::builder(credentials()).node_id(0).build().unwrap();
        assert_eq!(config.node_id(), None);
        let config = FeedConfig::builder(credentials()).node_id(4).build().unwrap();
        assert_eq!(config.node_id(), Some(4));
    }

    #[test]
    fn later_watermark_replaces_earlier() {
        let config = FeedConfig::builder(credentials())
            .recover(Producer(1), 100)
            .recover(Producer(3), 0)
            .recover(Producer(1), 200)
            .build()
            .unwrap();
        assert_eq!(
            config.recovery(),
            &[
                ProducerChange::new(Producer(3), 0),
                ProducerChange::new(Producer(1), 200)
            ]
        );
    }

    #[test]
    fn build_validates() {
        assert!(
            FeedConfig::builder(Credentials::new("", "t"))
                .build()
                .is_err()
        );
        assert!(
            FeedConfig::builder(credentials())
                .languages(Vec::new())
                .build()
                .is_err()
        );
        assert!(
            FeedConfig::builder(credentials())
                .channel_capacity(0)
                .build()
                .is_err()
        );
        assert!(
            FeedConfig::builder(credentials())
                .cache(CachePolicy::Lru(0))
                .build()
                .is_err()
        );
    }

    #[test]
    fn recovery_list_parsing() {
        let list = parse_recovery_list("1:1700000000000, 3:0").unwrap();
        assert_eq!(
            list,
            vec![
                ProducerChange::new(Producer(1), 1_700_000_000_000),
                ProducerChange::new(Producer(3), 0)
            ]
        );
        assert!(parse_recovery_list("1").is_err());
        assert!(parse_recovery_list("x:1").is_err());
    }

    #[test]
    fn credentials_redacted_debug() {
        let debug = format!("{:?}", credentials());
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn telemetry_travels_with_the_config() {
        let config = FeedConfig::builder(credentials()).build().unwrap();
        assert_eq!(config.telemetry(), &TelemetryConfig::default());

        let config = FeedConfig::builder(credentials())
            .telemetry(TelemetryConfig::disabled())
            .build()
            .unwrap();
        assert!(!config.telemetry().enabled);

        let missing_endpoint = TelemetryConfig {
            otlp_endpoint: " ".to_string(),
            ..TelemetryConfig::default()
        };
        assert_eq!(
            FeedConfig::builder(credentials())
                .telemetry(missing_endpoint)
                .build()
                .unwrap_err(),
            ConfigError::EmptyValue("otlp_endpoint".to_string())
        );
    }

    #[test]
    fn fixture_preload_is_off_by_default() {
        let config = FeedConfig::builder(credentials()).build().unwrap();
        assert_eq!(config.fixture_preload(), None);

        let until = Utc::now();
        let config = FeedConfig::builder(credentials())
            .preload_fixtures(until)
            .build()
            .unwrap();
        assert_eq!(config.fixture_preload(), Some(until));
    }

    #[test]
    fn api_base_url_override_trims_slash() {
        let config = FeedConfig::builder(credentials())
            .api_base_url("http://127.0.0.1:9000/")
            .build()
            .unwrap();
        assert_eq!(config.api_base_url(), "http://127.0.0.1:9000");
    }
}
