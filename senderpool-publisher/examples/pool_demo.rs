//! Publishes a burst of orders through a pool backed by discovered brokers.
//!
//! Run with `RUST_LOG=debug` to watch handles being built and reused.

use senderpool_core::config::{DiscoverySettings, LoggingSettings};
use senderpool_core::telemetry::init_logging;
use senderpool_discovery::MemoryTree;
use senderpool_publisher::prelude::*;
use senderpool_publisher::MemoryBroker;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
struct Order {
    id: u32,
    sku: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LoggingSettings::default())?;

    let tree = MemoryTree::new()
        .with_partition_leaders("/brokers", "orders", &[0, 1, 0])
        .with_broker("/brokers", 0, "kafka-0.internal", 9092)
        .with_broker("/brokers", 1, "kafka-1.internal", 9092);
    let broker = MemoryBroker::new();

    let pool = PoolBuilder::new("orders")
        .capacity(4)
        .discovery(DiscoverySettings::new("zk1:2181,zk2:2181"))
        .tree_connector(Arc::new(tree))
        .dispatch(DispatchMode::Async)
        .build(Arc::new(broker.clone()))
        .await?;

    let mut workers = Vec::new();
    for id in 0..16 {
        let pool = pool.clone();
        workers.push(tokio::spawn(async move {
            let handle = pool.acquire(Duration::from_secs(1)).await?;
            handle.send_encoded(&Order { id, sku: "A-100" }, &JsonEncoder).await?;
            handle.release(&pool).await
        }));
    }
    for worker in workers {
        worker.await.map_err(|e| Error::handle_fault(e.to_string()))??;
    }

    let report = pool.shutdown().await;
    let topic = pool.topic().clone();
    println!(
        "brokers {}; published {}; closed {} handles",
        pool.endpoints(),
        broker.published(&topic).len(),
        report.closed
    );
    Ok(())
}
