//! # Prelude
//!
//! Commonly used types from SenderPool Core.

pub use crate::{
    config::{
        BrokerSource, ConfigLoader, DiscoverySettings, DispatchMode, ProducerSettings,
        SenderPoolConfig,
    },
    error::{Error, Result},
    types::{BrokerId, Endpoint, EndpointList, PartitionId, Topic},
};

pub use bytes::Bytes;
