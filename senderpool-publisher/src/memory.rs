//! In-memory broker for tests and demos.

use crate::client::{BrokerClient, BrokerConnector, ConnectionSettings, ProducerRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use senderpool_core::{Error, Result, Topic};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct BrokerState {
    records: DashMap<Topic, Vec<ProducerRecord>>,
    connections_opened: AtomicUsize,
    close_calls: AtomicUsize,
    refuse_connections: AtomicU32,
    reject_publishes: AtomicBool,
    connect_delay: Mutex<Duration>,
    last_settings: Mutex<Option<ConnectionSettings>>,
}

/// Stores published records per topic and counts connection lifecycle
/// events. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records published to `topic`, in arrival order.
    #[must_use]
    pub fn published(&self, topic: &Topic) -> Vec<ProducerRecord> {
        self.state.records.get(topic).map(|records| records.value().clone()).unwrap_or_default()
    }

    /// Connections opened so far.
    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.state.connections_opened.load(Ordering::SeqCst)
    }

    /// Calls to `close` across all connections, repeated calls included.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    /// Settings passed to the most recent connect.
    #[must_use]
    pub fn last_settings(&self) -> Option<ConnectionSettings> {
        self.state.last_settings.lock().clone()
    }

    /// Refuse the next `attempts` connects.
    pub fn refuse_connections(&self, attempts: u32) {
        self.state.refuse_connections.store(attempts, Ordering::SeqCst);
    }

    /// Make every publish fail until switched back off.
    pub fn reject_publishes(&self, reject: bool) {
        self.state.reject_publishes.store(reject, Ordering::SeqCst);
    }

    /// Delay every connect by `delay`.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock() = delay;
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn BrokerClient>> {
        let delay = *self.state.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let refused = self
            .state
            .refuse_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(Error::handle_fault(format!("connection to {} refused", settings.endpoints())));
        }

        *self.state.last_settings.lock() = Some(settings.clone());
        self.state.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection { state: Arc::clone(&self.state), closed: AtomicBool::new(false) }))
    }
}

struct MemoryConnection {
    state: Arc<BrokerState>,
    closed: AtomicBool,
}

#[async_trait]
impl BrokerClient for MemoryConnection {
    async fn publish(&self, record: ProducerRecord) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::handle_fault("connection is closed"));
        }
        if self.state.reject_publishes.load(Ordering::SeqCst) {
            return Err(Error::handle_fault(format!("broker rejected record for {}", record.topic)));
        }
        self.state.records.entry(record.topic.clone()).or_default().push(record);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
