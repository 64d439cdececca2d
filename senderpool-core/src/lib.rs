//! # SenderPool Core
//!
//! Foundations shared by the SenderPool crates: the error taxonomy, validated
//! domain types, configuration and logging set-up.
//!
//! ## Quick Start
//!
//! ```rust
//! use senderpool_core::{EndpointList, Topic};
//!
//! # fn main() -> senderpool_core::Result<()> {
//! let topic = Topic::new("orders")?;
//! let endpoints: EndpointList = "10.1.110.21:9092,10.1.110.22:9092".parse()?;
//!
//! assert_eq!(topic.as_str(), "orders");
//! assert_eq!(endpoints.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types and result handling
//! - [`types`]: Topics, partitions, broker ids and endpoints
//! - [`config`]: Configuration schema, loading and validation
//! - [`telemetry`]: Logging initialisation
//! - [`prelude`]: Common imports for convenient usage

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod prelude;
pub mod telemetry;
pub mod types;

pub use crate::{
    config::{DispatchMode, SenderPoolConfig},
    error::{Error, Result},
    types::{BrokerId, Endpoint, EndpointList, PartitionId, Topic},
};
