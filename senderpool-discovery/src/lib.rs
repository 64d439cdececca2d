//! # SenderPool Discovery
//!
//! Resolves the leader endpoints of a topic's partitions by reading the
//! broker metadata a cluster keeps in its coordination service.
//!
//! Reading is done through the [`TreeConnector`] and [`CoordinationTree`]
//! traits so any coordination client can be plugged in. [`MemoryTree`]
//! implements both for tests and static deployments.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod directory;
pub mod memory;
pub mod records;
pub mod retry;
pub mod tree;

pub use directory::{EndpointDirectory, TreePaths};
pub use memory::MemoryTree;
pub use records::{BrokerRegistration, PartitionState};
pub use retry::{connect_with_retry, RetryPolicy};
pub use tree::{CoordinationTree, TreeConnector, TreeError, TreeResult};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CoordinationTree, EndpointDirectory, MemoryTree, RetryPolicy, TreeConnector, TreeError,
    };
}
