//! # SenderPool Publisher
//!
//! A bounded pool of reusable publishing handles for one topic.
//!
//! This crate provides:
//! - [`HandlePool`]: fixed-capacity checkout with timeouts and FIFO reuse
//! - [`PublishHandle`]: keyed, unkeyed and encoded sends over one connection
//! - [`PoolBuilder`]: pool set-up from a literal broker list, broker
//!   discovery or a loaded [`SenderPoolConfig`](senderpool_core::SenderPoolConfig)
//! - inline or buffered dispatch
//!
//! ## Examples
//!
//! ```rust
//! use senderpool_publisher::{MemoryBroker, PoolBuilder};
//! use std::{sync::Arc, time::Duration};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> senderpool_core::Result<()> {
//! let broker = MemoryBroker::new();
//! let pool = PoolBuilder::new("orders")
//!     .capacity(2)
//!     .endpoints("localhost:9092")
//!     .build(Arc::new(broker.clone()))
//!     .await?;
//!
//! let handle = pool.acquire(Duration::from_millis(100)).await?;
//! handle.send("ping").await?;
//! handle.release(&pool).await?;
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod buffered;
pub mod builder;
pub mod client;
pub mod encoder;
pub mod fanout;
pub mod handle;
pub mod memory;
pub mod pool;

pub use builder::PoolBuilder;
pub use client::{BrokerClient, BrokerConnector, ConnectionSettings, ProducerRecord};
pub use encoder::{JsonEncoder, MessageEncoder, Utf8Encoder};
pub use fanout::FanOutReport;
pub use handle::{HandleId, PoolId, PublishHandle};
pub use memory::MemoryBroker;
pub use pool::{HandlePool, PoolOptions, PoolStats, ShutdownReport};
pub use senderpool_core::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        HandlePool, JsonEncoder, MessageEncoder, PoolBuilder, PublishHandle, Utf8Encoder,
    };
    pub use senderpool_core::prelude::*;
}
