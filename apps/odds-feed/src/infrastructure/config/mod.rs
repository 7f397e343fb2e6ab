//! Configuration Module
//!
//! Environment hosts, credentials and the immutable session configuration.

mod settings;

pub use settings::{
    CachePolicy, ConfigError, Credentials, DEFAULT_CHANNEL_CAPACITY, DEFAULT_LANGUAGES,
    DEFAULT_REQUEST_TIMEOUT, Environment, FeedConfig, FeedConfigBuilder,
};
