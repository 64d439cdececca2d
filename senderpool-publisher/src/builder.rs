//! Pool construction from settings or configuration.

use crate::client::BrokerConnector;
use crate::pool::{HandlePool, PoolOptions};
use senderpool_core::config::{BrokerSource, DiscoverySettings, SenderPoolConfig};
use senderpool_core::{DispatchMode, EndpointList, Error, Result, Topic};
use senderpool_discovery::{EndpointDirectory, TreeConnector};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder for [`HandlePool`].
///
/// ```no_run
/// # async fn demo(broker: std::sync::Arc<dyn senderpool_publisher::BrokerConnector>) -> senderpool_core::Result<()> {
/// use senderpool_publisher::PoolBuilder;
///
/// let pool = PoolBuilder::new("orders")
///     .capacity(8)
///     .endpoints("kafka-1:9092,kafka-2:9092")
///     .build(broker)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PoolBuilder {
    topic: String,
    capacity: usize,
    source: BrokerSource,
    options: PoolOptions,
    tree: Option<Arc<dyn TreeConnector>>,
}

impl std::fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("topic", &self.topic)
            .field("capacity", &self.capacity)
            .field("source", &self.source)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl PoolBuilder {
    /// Start from the default configuration for `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        let defaults = SenderPoolConfig::default();
        Self {
            topic: topic.into(),
            capacity: defaults.pool.capacity,
            source: defaults.brokers,
            options: PoolOptions::default(),
            tree: None,
        }
    }

    /// Start from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &SenderPoolConfig) -> Self {
        Self {
            topic: config.pool.topic.clone(),
            capacity: config.pool.capacity,
            source: config.brokers.clone(),
            options: PoolOptions {
                init_timeout: config.pool.init_timeout,
                dispatch: config.producer.dispatch,
                async_buffer: config.producer.async_buffer,
                properties: config.producer.properties.clone(),
            },
            tree: None,
        }
    }

    /// Number of handles.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Use a literal comma-joined `host:port` broker list.
    #[must_use]
    pub fn endpoints(mut self, endpoints: impl Into<String>) -> Self {
        self.source = BrokerSource::Static { endpoints: endpoints.into() };
        self
    }

    /// Resolve brokers from a coordination service instead.
    #[must_use]
    pub fn discovery(mut self, settings: DiscoverySettings) -> Self {
        self.source = BrokerSource::Discovery(settings);
        self
    }

    /// Coordination client used when discovery is selected.
    #[must_use]
    pub fn tree_connector(mut self, connector: Arc<dyn TreeConnector>) -> Self {
        self.tree = Some(connector);
        self
    }

    /// Inline or buffered publishing.
    #[must_use]
    pub const fn dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.options.dispatch = dispatch;
        self
    }

    /// Per-handle queue size under async dispatch.
    #[must_use]
    pub const fn async_buffer(mut self, entries: usize) -> Self {
        self.options.async_buffer = entries;
        self
    }

    /// Bound on initial construction and shutdown teardown.
    #[must_use]
    pub const fn init_timeout(mut self, timeout: Duration) -> Self {
        self.options.init_timeout = timeout;
        self
    }

    /// Add a broker client property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.properties.insert(key.into(), value.into());
        self
    }

    /// Resolve endpoints and build the pool.
    ///
    /// # Errors
    /// - [`Error::InvalidTopic`] or [`Error::InvalidEndpoint`] for bad input
    /// - [`Error::Configuration`] for a zero capacity, or discovery without a
    ///   tree connector
    /// - [`Error::Discovery`] if endpoint resolution fails
    pub async fn build(self, connector: Arc<dyn BrokerConnector>) -> Result<HandlePool> {
        let topic = Topic::new(self.topic)?;

        let endpoints: EndpointList = match self.source {
            BrokerSource::Static { endpoints } => endpoints.parse()?,
            BrokerSource::Discovery(settings) => {
                let tree = self.tree.ok_or_else(|| {
                    Error::Configuration(
                        "broker discovery needs a coordination tree connector".to_string(),
                    )
                })?;
                EndpointDirectory::new(tree).resolve(&settings, &topic).await?
            },
        };
        info!(%topic, capacity = self.capacity, brokers = %endpoints, "Building handle pool");

        HandlePool::new(topic, self.capacity, endpoints, connector, self.options).await
    }
}
