//! Configuration schema definitions for SenderPool
//!
//! All configuration structures use serde for (de)serialization and validator
//! for field-level validation. Cross-field rules live in
//! [`ConfigValidator`](super::ConfigValidator).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Default coordination-service root under which brokers register.
pub const DEFAULT_ROOT_PATH: &str = "/brokers";

/// Default bound on pool construction and shutdown fan-out.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between coordination-service connection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Root configuration object.
///
/// Layered as defaults → file → environment, see
/// [`ConfigLoader`](super::ConfigLoader).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SenderPoolConfig {
    /// Pool sizing and timeouts
    #[validate(nested)]
    pub pool: PoolSettings,

    /// Where broker endpoints come from
    #[serde(default)]
    pub brokers: BrokerSource,

    /// Broker client behaviour
    #[serde(default)]
    #[validate(nested)]
    pub producer: ProducerSettings,

    /// Log output
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingSettings,
}

/// Pool sizing and lifecycle timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PoolSettings {
    /// Topic every handle of the pool publishes to
    #[validate(length(min = 1, max = 249))]
    pub topic: String,

    /// Number of handles built up front, and the checkout limit
    #[validate(range(min = 1, max = 10_000))]
    pub capacity: usize,

    /// Upper bound on parallel handle construction and teardown
    #[serde(with = "duration_ms", default = "default_init_timeout", rename = "init_timeout_ms")]
    pub init_timeout: Duration,

    /// Checkout deadline callers may use when they have none of their own
    #[serde(with = "duration_ms", default = "default_acquire_timeout", rename = "acquire_timeout_ms")]
    pub acquire_timeout: Duration,
}

/// Where broker endpoints come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BrokerSource {
    /// A literal comma-joined `host:port` list
    Static {
        /// Comma-joined `host:port` list
        endpoints: String,
    },
    /// Resolve partition leaders from a coordination service
    Discovery(DiscoverySettings),
}

impl Default for BrokerSource {
    fn default() -> Self {
        Self::Static { endpoints: "localhost:9092".to_string() }
    }
}

/// Coordination-service locator plus connection retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Connection string understood by the coordination client
    pub connection_string: String,

    /// Root path brokers register under
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Pause between connection attempts
    #[serde(with = "duration_ms", default = "default_retry_interval", rename = "retry_interval_ms")]
    pub retry_interval: Duration,

    /// Give up after this many attempts; retry forever when unset
    #[serde(default)]
    pub max_connect_attempts: Option<u32>,
}

impl DiscoverySettings {
    /// Locator with the default root path and retry policy.
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            root_path: default_root_path(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_connect_attempts: None,
        }
    }

    /// Use a non-default root path.
    #[must_use]
    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    /// Bound the number of connection attempts.
    #[must_use]
    pub const fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = Some(attempts);
        self
    }

    /// Set the pause between connection attempts.
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// How a handle hands messages to its broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Publish inline; `send` returns after the broker client does
    #[default]
    Sync,
    /// Enqueue into a bounded buffer drained in the background
    Async,
}

impl DispatchMode {
    /// Value used for the `producer.type` broker property.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

/// Broker client behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProducerSettings {
    /// Inline or buffered dispatch
    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Capacity of the per-handle buffer under async dispatch
    #[validate(range(min = 1, max = 1_048_576))]
    #[serde(default = "default_async_buffer")]
    pub async_buffer: usize,

    /// Extra properties handed to the broker connector untouched
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Sync,
            async_buffer: default_async_buffer(),
            properties: BTreeMap::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `senderpool_publisher=debug`
    #[validate(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level(), format: LogFormat::Text }
    }
}

impl Default for SenderPoolConfig {
    fn default() -> Self {
        Self {
            pool: PoolSettings {
                topic: "default".to_string(),
                capacity: default_capacity(),
                init_timeout: DEFAULT_INIT_TIMEOUT,
                acquire_timeout: default_acquire_timeout(),
            },
            brokers: BrokerSource::default(),
            producer: ProducerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_capacity() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get() * 2 + 1)
}

fn default_init_timeout() -> Duration {
    DEFAULT_INIT_TIMEOUT
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_retry_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

fn default_root_path() -> String {
    DEFAULT_ROOT_PATH.to_string()
}

fn default_async_buffer() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SenderPoolConfig::default();
        assert!(config.pool.capacity >= 1);
        assert_eq!(config.pool.init_timeout, Duration::from_secs(120));
        assert_eq!(config.producer.dispatch, DispatchMode::Sync);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_discovery_source_from_toml() {
        let source: BrokerSource = toml::from_str(
            r#"
            mode = "discovery"
            connection_string = "zk1:2181,zk2:2181"
            "#,
        )
        .unwrap();

        let BrokerSource::Discovery(settings) = source else {
            panic!("expected discovery source");
        };
        assert_eq!(settings.root_path, DEFAULT_ROOT_PATH);
        assert_eq!(settings.retry_interval, DEFAULT_RETRY_INTERVAL);
        assert_eq!(settings.max_connect_attempts, None);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = SenderPoolConfig::default();
        config.pool.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatch_mode_property_value() {
        assert_eq!(DispatchMode::Sync.as_str(), "sync");
        assert_eq!(DispatchMode::Async.as_str(), "async");
    }
}
