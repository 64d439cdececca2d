//! # Configuration Validation
//!
//! Field-level rules come from the `validator` derives on the schema; this
//! module adds the rules that need parsing or span several fields.

use crate::{
    config::schema::{BrokerSource, DiscoverySettings, SenderPoolConfig},
    EndpointList, Error, Result, Topic,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use validator::Validate;

/// Pools larger than this open a worrying number of broker connections.
const LARGE_POOL_WARNING: usize = 1_000;

/// Configuration validator.
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a configuration.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] describing the first rule violated.
    pub fn validate(config: &SenderPoolConfig) -> Result<()> {
        debug!("Starting configuration validation");

        config.validate()?;

        Self::validate_pool(config)?;
        Self::validate_brokers(&config.brokers)?;
        Self::validate_logging(config)?;

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_pool(config: &SenderPoolConfig) -> Result<()> {
        Topic::new(config.pool.topic.as_str())
            .map_err(|e| Error::Configuration(format!("pool.topic: {e}")))?;

        if config.pool.init_timeout.is_zero() {
            return Err(Error::Configuration(
                "pool.init_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if config.pool.acquire_timeout.is_zero() {
            return Err(Error::Configuration(
                "pool.acquire_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if config.pool.capacity > LARGE_POOL_WARNING {
            warn!(
                capacity = config.pool.capacity,
                "Every pooled handle holds its own broker connection"
            );
        }

        Ok(())
    }

    fn validate_brokers(source: &BrokerSource) -> Result<()> {
        match source {
            BrokerSource::Static { endpoints } => {
                let list: EndpointList = endpoints
                    .parse()
                    .map_err(|e| Error::Configuration(format!("brokers.endpoints: {e}")))?;
                if list.is_empty() {
                    return Err(Error::Configuration(
                        "brokers.endpoints must name at least one broker".to_string(),
                    ));
                }
                Ok(())
            },
            BrokerSource::Discovery(settings) => Self::validate_discovery(settings),
        }
    }

    fn validate_discovery(settings: &DiscoverySettings) -> Result<()> {
        if settings.connection_string.trim().is_empty() {
            return Err(Error::Configuration(
                "brokers.connection_string cannot be empty".to_string(),
            ));
        }

        if !settings.root_path.starts_with('/') {
            return Err(Error::Configuration(format!(
                "brokers.root_path '{}' must be absolute",
                settings.root_path
            )));
        }

        if settings.retry_interval.is_zero() {
            return Err(Error::Configuration(
                "brokers.retry_interval_ms must be greater than 0".to_string(),
            ));
        }

        if settings.max_connect_attempts == Some(0) {
            return Err(Error::Configuration(
                "brokers.max_connect_attempts must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_logging(config: &SenderPoolConfig) -> Result<()> {
        EnvFilter::try_new(&config.logging.level).map_err(|e| {
            Error::Configuration(format!("logging.level '{}': {e}", config.logging.level))
        })?;
        Ok(())
    }
}
