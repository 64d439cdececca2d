//! Broker client port.
//!
//! A [`BrokerClient`] is one exclusively owned connection able to publish to
//! a topic. The wire protocol lives behind the trait; the pool only needs to
//! open, use and close connections.

use async_trait::async_trait;
use bytes::Bytes;
use senderpool_core::{DispatchMode, EndpointList, Result, Topic};
use std::collections::BTreeMap;

/// Property carrying the comma-joined `host:port` broker list.
pub const BROKER_LIST_KEY: &str = "metadata.broker.list";

/// Property carrying the dispatch mode, `sync` or `async`.
pub const PRODUCER_TYPE_KEY: &str = "producer.type";

/// One message bound for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    /// Destination topic
    pub topic: Topic,
    /// Partitioning key; `None` lets the client pick the partition
    pub key: Option<Bytes>,
    /// Message body
    pub payload: Bytes,
}

impl ProducerRecord {
    /// An unkeyed record.
    #[must_use]
    pub const fn new(topic: Topic, payload: Bytes) -> Self {
        Self { topic, key: None, payload }
    }

    /// Attach a partitioning key.
    #[must_use]
    pub fn with_key(mut self, key: Bytes) -> Self {
        self.key = Some(key);
        self
    }
}

/// Everything a connector needs to open a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    endpoints: EndpointList,
    properties: BTreeMap<String, String>,
}

impl ConnectionSettings {
    /// Settings for `endpoints` under `dispatch`, with caller `overrides`
    /// layered on top. The broker list always reflects `endpoints`.
    #[must_use]
    pub fn new(
        endpoints: EndpointList,
        dispatch: DispatchMode,
        overrides: &BTreeMap<String, String>,
    ) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(PRODUCER_TYPE_KEY.to_string(), dispatch.as_str().to_string());
        properties.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        properties.insert(BROKER_LIST_KEY.to_string(), endpoints.to_string());
        Self { endpoints, properties }
    }

    /// Brokers to connect to.
    #[must_use]
    pub const fn endpoints(&self) -> &EndpointList {
        &self.endpoints
    }

    /// Look up a single property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// All properties, sorted by key.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// An open broker connection.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Publish one record.
    ///
    /// # Errors
    /// Returns [`Error::HandleFault`](senderpool_core::Error::HandleFault)
    /// if the broker rejects the record or the connection is lost.
    async fn publish(&self, record: ProducerRecord) -> Result<()>;

    /// Close the connection. Publishing afterwards fails.
    ///
    /// # Errors
    /// Returns [`Error::HandleFault`](senderpool_core::Error::HandleFault)
    /// if pending data could not be flushed.
    async fn close(&self) -> Result<()>;
}

/// Opens broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open one connection.
    ///
    /// # Errors
    /// Returns [`Error::HandleFault`](senderpool_core::Error::HandleFault)
    /// if no broker accepts the connection.
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn BrokerClient>>;
}
