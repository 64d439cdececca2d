//! Publishing handles.

use crate::client::{BrokerClient, ProducerRecord};
use crate::encoder::MessageEncoder;
use crate::pool::HandlePool;
use bytes::Bytes;
use senderpool_core::{Result, Topic};
use std::fmt;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;
use uuid::Uuid;

/// Identifies a handle within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Identifies a pool. Handles carry the id of the pool that built them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(Uuid);

impl PoolId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A broker connection bound to one topic.
///
/// Obtained from [`HandlePool::acquire`]. Give it back with
/// [`release`](Self::release) when done, or [`shut_down`](Self::shut_down)
/// to close the connection for good. Dropping a checked-out handle returns
/// its slot to the pool but leaves the connection unclosed.
pub struct PublishHandle {
    id: HandleId,
    pool: PoolId,
    topic: Topic,
    client: Box<dyn BrokerClient>,
    checkout: Option<OwnedSemaphorePermit>,
}

impl PublishHandle {
    pub(crate) fn new(id: HandleId, pool: PoolId, topic: Topic, client: Box<dyn BrokerClient>) -> Self {
        Self { id, pool, topic, client, checkout: None }
    }

    /// This handle's id.
    #[must_use]
    pub const fn id(&self) -> HandleId {
        self.id
    }

    /// Id of the pool that built this handle.
    #[must_use]
    pub const fn pool_id(&self) -> PoolId {
        self.pool
    }

    /// Topic every send goes to.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Publish `payload` without a key.
    ///
    /// # Errors
    /// Returns [`Error::HandleFault`](senderpool_core::Error::HandleFault) if
    /// the broker connection fails.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.client.publish(ProducerRecord::new(self.topic.clone(), payload.into())).await
    }

    /// Publish `payload` partitioned by `key`.
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn send_keyed(&self, key: impl Into<Bytes>, payload: impl Into<Bytes>) -> Result<()> {
        let record = ProducerRecord::new(self.topic.clone(), payload.into()).with_key(key.into());
        self.client.publish(record).await
    }

    /// Encode `value` with `encoder` and publish the result.
    ///
    /// # Errors
    /// Returns [`Error::Encoding`](senderpool_core::Error::Encoding) if the
    /// encoder fails; otherwise see [`send`](Self::send).
    pub async fn send_encoded<T, E>(&self, value: &T, encoder: &E) -> Result<()>
    where
        T: ?Sized,
        E: MessageEncoder<T> + ?Sized,
    {
        let payload = encoder.encode(value)?;
        self.send(payload).await
    }

    /// Return this handle to `pool` for reuse.
    ///
    /// # Errors
    /// Returns [`Error::ForeignHandle`](senderpool_core::Error::ForeignHandle)
    /// if `pool` did not build this handle.
    pub async fn release(self, pool: &HandlePool) -> Result<()> {
        pool.release(self).await
    }

    /// Close the broker connection. The handle cannot be used afterwards.
    ///
    /// # Errors
    /// Returns [`Error::HandleFault`](senderpool_core::Error::HandleFault) if
    /// the connection did not close cleanly. The handle is gone either way.
    pub async fn shut_down(self) -> Result<()> {
        debug!(handle = %self.id, topic = %self.topic, "Shutting down handle");
        self.client.close().await
    }

    pub(crate) fn check_out(&mut self, permit: OwnedSemaphorePermit) {
        self.checkout = Some(permit);
    }

    pub(crate) fn check_in(&mut self) -> Option<OwnedSemaphorePermit> {
        self.checkout.take()
    }

    pub(crate) const fn is_checked_out(&self) -> bool {
        self.checkout.is_some()
    }
}

impl fmt::Debug for PublishHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishHandle")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .field("topic", &self.topic)
            .field("checked_out", &self.is_checked_out())
            .finish_non_exhaustive()
    }
}
