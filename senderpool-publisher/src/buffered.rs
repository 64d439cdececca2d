//! Buffered dispatch.
//!
//! [`BufferedClient`] puts a bounded channel in front of another client and
//! drains it from a background task. `publish` returns once the record is
//! queued; `close` waits for the queue to drain and then closes the wrapped
//! client.

use crate::client::{BrokerClient, ProducerRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use senderpool_core::{Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Client wrapper that publishes from a background task.
pub struct BufferedClient {
    sender: Mutex<Option<mpsc::Sender<ProducerRecord>>>,
    worker: Mutex<Option<JoinHandle<Box<dyn BrokerClient>>>>,
}

impl BufferedClient {
    /// Start draining into `inner` with room for `capacity` queued records.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(inner: Box<dyn BrokerClient>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(drain(inner, receiver));
        Self { sender: Mutex::new(Some(sender)), worker: Mutex::new(Some(worker)) }
    }
}

async fn drain(
    inner: Box<dyn BrokerClient>,
    mut receiver: mpsc::Receiver<ProducerRecord>,
) -> Box<dyn BrokerClient> {
    let mut delivered = 0u64;
    while let Some(record) = receiver.recv().await {
        let topic = record.topic.clone();
        match inner.publish(record).await {
            Ok(()) => delivered += 1,
            Err(e) => error!(%topic, "Buffered delivery failed: {e}"),
        }
    }
    debug!(delivered, "Dispatch buffer drained");
    inner
}

#[async_trait]
impl BrokerClient for BufferedClient {
    async fn publish(&self, record: ProducerRecord) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| Error::handle_fault("dispatch buffer is closed"))?;
        sender
            .send(record)
            .await
            .map_err(|_| Error::handle_fault("dispatch worker has stopped"))
    }

    async fn close(&self) -> Result<()> {
        // Dropping the last sender ends the drain loop once the queue is empty.
        drop(self.sender.lock().take());

        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        let inner = worker
            .await
            .map_err(|e| Error::handle_fault(format!("dispatch worker failed: {e}")))?;
        inner.close().await
    }
}

impl Drop for BufferedClient {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}
