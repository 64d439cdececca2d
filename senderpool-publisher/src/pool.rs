//! Bounded pool of publishing handles.
//!
//! A pool of capacity N hands out at most N handles at a time. Checkouts are
//! counted by a semaphore; released handles wait in a FIFO idle queue for
//! reuse. When the queue is empty but a permit is free (because initial
//! construction came up short, or a handle was discarded), `acquire` builds a
//! fresh handle and gives it straight to the caller.
//!
//! Shutdown takes the write side of a lock every acquire and release holds
//! for reading, so no handle enters or leaves the idle queue while it drains.

use crate::buffered::BufferedClient;
use crate::client::{BrokerClient, BrokerConnector, ConnectionSettings};
use crate::fanout::{join_within, FanOutReport};
use crate::handle::{HandleId, PoolId, PublishHandle};
use parking_lot::Mutex;
use senderpool_core::{config::DEFAULT_INIT_TIMEOUT, DispatchMode, EndpointList, Error, Result, Topic};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Knobs for [`HandlePool::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Bound on initial construction, and again on shutdown teardown
    pub init_timeout: Duration,
    /// Inline or buffered publishing
    pub dispatch: DispatchMode,
    /// Per-handle queue size under [`DispatchMode::Async`]
    pub async_buffer: usize,
    /// Extra properties handed to the connector
    pub properties: BTreeMap<String, String>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            init_timeout: DEFAULT_INIT_TIMEOUT,
            dispatch: DispatchMode::Sync,
            async_buffer: 1024,
            properties: BTreeMap::new(),
        }
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of handles checked out at once
    pub capacity: usize,
    /// Handles waiting in the idle queue
    pub idle: usize,
    /// Permits currently held by callers
    pub checked_out: usize,
    /// Handles built over the pool's lifetime
    pub constructed: usize,
    /// Handles the pool closed itself
    pub closed: usize,
}

/// Outcome of [`HandlePool::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The pool was already shut down and nothing was done
    pub already_shut_down: bool,
    /// Idle handles closed cleanly
    pub closed: usize,
    /// Idle handles whose close reported an error
    pub failed: usize,
    /// Idle handles still closing at the deadline
    pub abandoned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Open,
    Closed,
}

/// Builds handles for one pool.
struct HandleFactory {
    pool: PoolId,
    topic: Topic,
    settings: ConnectionSettings,
    connector: Arc<dyn BrokerConnector>,
    dispatch: DispatchMode,
    async_buffer: usize,
    next_id: AtomicU64,
    constructed: AtomicUsize,
}

impl HandleFactory {
    async fn build(&self) -> Result<PublishHandle> {
        let id = HandleId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let client = self.connector.connect(&self.settings).await?;
        let client: Box<dyn BrokerClient> = match self.dispatch {
            DispatchMode::Sync => client,
            DispatchMode::Async => Box::new(BufferedClient::spawn(client, self.async_buffer)),
        };
        self.constructed.fetch_add(1, Ordering::Relaxed);
        debug!(handle = %id, topic = %self.topic, "Constructed handle");
        Ok(PublishHandle::new(id, self.pool, self.topic.clone(), client))
    }
}

struct PoolInner {
    id: PoolId,
    capacity: usize,
    init_timeout: Duration,
    factory: Arc<HandleFactory>,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<PublishHandle>>,
    state: RwLock<PoolState>,
    closed: AtomicUsize,
}

/// A fixed-capacity pool of [`PublishHandle`]s for one topic.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct HandlePool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for HandlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlePool")
            .field("id", &self.inner.id)
            .field("topic", &self.inner.factory.topic)
            .field("capacity", &self.inner.capacity)
            .finish_non_exhaustive()
    }
}

impl HandlePool {
    /// Build a pool and fill it with `capacity` handles.
    ///
    /// Handles are constructed in parallel. Whatever is not ready after
    /// `options.init_timeout` is abandoned, and construction failures are
    /// logged; either way the pool starts with fewer idle handles and grows
    /// back on demand.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `capacity` is zero.
    pub async fn new(
        topic: Topic,
        capacity: usize,
        endpoints: EndpointList,
        connector: Arc<dyn BrokerConnector>,
        options: PoolOptions,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Configuration("pool capacity must be at least 1".to_string()));
        }
        if endpoints.is_empty() {
            warn!(%topic, "Creating a pool with an empty broker list");
        }

        let id = PoolId::generate();
        let settings = ConnectionSettings::new(endpoints, options.dispatch, &options.properties);
        let factory = Arc::new(HandleFactory {
            pool: id,
            topic,
            settings,
            connector,
            dispatch: options.dispatch,
            async_buffer: options.async_buffer,
            next_id: AtomicU64::new(0),
            constructed: AtomicUsize::new(0),
        });
        let pool = Self {
            inner: Arc::new(PoolInner {
                id,
                capacity,
                init_timeout: options.init_timeout,
                factory,
                permits: Arc::new(Semaphore::new(capacity)),
                idle: Mutex::new(VecDeque::with_capacity(capacity)),
                state: RwLock::new(PoolState::Open),
                closed: AtomicUsize::new(0),
            }),
        };

        let report = pool.fill().await;
        let idle = pool.inner.idle.lock().len();
        if report.is_complete() {
            info!(pool = %id, topic = %pool.topic(), capacity, "Handle pool ready");
        } else {
            warn!(
                pool = %id,
                topic = %pool.topic(),
                capacity,
                idle,
                failed = report.failed,
                abandoned = report.abandoned,
                "Handle pool started degraded"
            );
        }

        Ok(pool)
    }

    async fn fill(&self) -> FanOutReport {
        let mut tasks = JoinSet::new();
        for _ in 0..self.inner.capacity {
            let factory = Arc::clone(&self.inner.factory);
            tasks.spawn(async move { factory.build().await });
        }

        let idle = &self.inner.idle;
        join_within("Handle construction", tasks, self.inner.init_timeout, |handle| {
            idle.lock().push_back(handle);
        })
        .await
    }

    /// Check out a handle, waiting at most `timeout` for one to free up.
    ///
    /// Reuses the longest-idle handle when there is one, and otherwise
    /// builds a new one.
    ///
    /// # Errors
    /// - [`Error::PoolTimeout`] if every handle stays checked out past
    ///   `timeout`; the pool is left unchanged
    /// - [`Error::PoolClosed`] once the pool has been shut down
    /// - whatever the connector reports if a new handle cannot be built
    pub async fn acquire(&self, timeout: Duration) -> Result<PublishHandle> {
        let permit =
            match tokio::time::timeout(timeout, Arc::clone(&self.inner.permits).acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(Error::PoolClosed),
                Err(_) => {
                    return Err(Error::PoolTimeout {
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                },
            };

        let state = self.inner.state.read().await;
        if *state == PoolState::Closed {
            return Err(Error::PoolClosed);
        }

        let reused = self.inner.idle.lock().pop_front();
        let mut handle = match reused {
            Some(handle) => handle,
            None => {
                debug!(topic = %self.topic(), "No idle handle, constructing one");
                self.inner.factory.build().await?
            },
        };
        drop(state);

        handle.check_out(permit);
        Ok(handle)
    }

    /// Put a handle back in the idle queue.
    ///
    /// A handle already present in the queue is ignored. After shutdown, or
    /// if the queue is somehow full, the handle is closed instead.
    ///
    /// # Errors
    /// Returns [`Error::ForeignHandle`] if another pool built `handle`. The
    /// handle is closed in that case.
    pub async fn release(&self, mut handle: PublishHandle) -> Result<()> {
        if handle.pool_id() != self.inner.id {
            return Err(self.reject_foreign(handle).await);
        }

        let state = self.inner.state.read().await;
        let permit = handle.check_in();

        if *state == PoolState::Closed {
            drop(state);
            debug!(handle = %handle.id(), "Pool is shut down, closing released handle");
            self.retire(handle).await;
            return Ok(());
        }

        let overflow = {
            let mut idle = self.inner.idle.lock();
            if idle.iter().any(|queued| queued.id() == handle.id()) {
                debug!(handle = %handle.id(), "Handle already idle, ignoring release");
                None
            } else if idle.len() >= self.inner.capacity {
                Some(handle)
            } else {
                idle.push_back(handle);
                None
            }
        };
        drop(permit);
        drop(state);

        if let Some(handle) = overflow {
            warn!(handle = %handle.id(), "Idle queue is full, closing released handle");
            self.retire(handle).await;
        }
        Ok(())
    }

    /// Close a handle instead of returning it, freeing its slot.
    ///
    /// Use this for a handle whose connection is known to be broken; the
    /// next acquire that finds no idle handle builds a replacement.
    ///
    /// # Errors
    /// Returns [`Error::ForeignHandle`] if another pool built `handle` (the
    /// handle is closed regardless), or the close failure of the handle's
    /// connection.
    pub async fn discard(&self, mut handle: PublishHandle) -> Result<()> {
        if handle.pool_id() != self.inner.id {
            return Err(self.reject_foreign(handle).await);
        }

        let permit = handle.check_in();
        let id = handle.id();
        let closed = handle.shut_down().await;
        self.inner.closed.fetch_add(1, Ordering::Relaxed);
        drop(permit);

        debug!(handle = %id, "Discarded handle");
        closed
    }

    /// Shut the pool down.
    ///
    /// Closes every idle handle in parallel, waiting at most the pool's
    /// init timeout; handles still closing after that are abandoned.
    /// Pending and future acquires fail with [`Error::PoolClosed`].
    /// Checked-out handles stay open until released. Calling this again
    /// does nothing.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut state = self.inner.state.write().await;
        if *state == PoolState::Closed {
            debug!(pool = %self.inner.id, "Pool already shut down");
            return ShutdownReport { already_shut_down: true, ..ShutdownReport::default() };
        }
        *state = PoolState::Closed;
        self.inner.permits.close();

        let drained: Vec<PublishHandle> = self.inner.idle.lock().drain(..).collect();
        let mut tasks = JoinSet::new();
        for handle in drained {
            tasks.spawn(handle.shut_down());
        }

        let closed = &self.inner.closed;
        let report = join_within("Handle teardown", tasks, self.inner.init_timeout, |()| {
            closed.fetch_add(1, Ordering::Relaxed);
        })
        .await;
        drop(state);

        info!(
            pool = %self.inner.id,
            closed = report.completed,
            failed = report.failed,
            abandoned = report.abandoned,
            "Handle pool shut down"
        );
        ShutdownReport {
            already_shut_down: false,
            closed: report.completed,
            failed: report.failed,
            abandoned: report.abandoned,
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub async fn is_shut_down(&self) -> bool {
        *self.inner.state.read().await == PoolState::Closed
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.inner.capacity,
            idle: self.inner.idle.lock().len(),
            checked_out: self.inner.capacity.saturating_sub(self.inner.permits.available_permits()),
            constructed: self.inner.factory.constructed.load(Ordering::Relaxed),
            closed: self.inner.closed.load(Ordering::Relaxed),
        }
    }

    /// Maximum number of handles checked out at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Topic every handle publishes to.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.inner.factory.topic
    }

    /// Brokers the handles connect to.
    #[must_use]
    pub fn endpoints(&self) -> &EndpointList {
        self.inner.factory.settings.endpoints()
    }

    /// This pool's id.
    #[must_use]
    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    async fn reject_foreign(&self, handle: PublishHandle) -> Error {
        let id = handle.id();
        warn!(handle = %id, owner = %handle.pool_id(), pool = %self.inner.id, "Rejecting foreign handle");
        if let Err(e) = handle.shut_down().await {
            error!(handle = %id, "Failed to close foreign handle: {e}");
        }
        Error::ForeignHandle { handle: id.to_string() }
    }

    async fn retire(&self, handle: PublishHandle) {
        let id = handle.id();
        if let Err(e) = handle.shut_down().await {
            error!(handle = %id, "Failed to close handle: {e}");
        }
        self.inner.closed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;

    async fn pool(broker: &MemoryBroker, capacity: usize) -> HandlePool {
        HandlePool::new(
            Topic::new("orders").unwrap(),
            capacity,
            "localhost:9092".parse().unwrap(),
            Arc::new(broker.clone()),
            PoolOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_release_of_twin_does_not_duplicate_idle_entry() {
        let broker = MemoryBroker::new();
        let pool = pool(&broker, 2).await;

        let handle = pool.acquire(Duration::from_millis(10)).await.unwrap();
        let id = handle.id();
        let settings = pool.inner.factory.settings.clone();
        let twin_client = broker.connect(&settings).await.unwrap();
        let twin = PublishHandle::new(id, pool.id(), pool.topic().clone(), twin_client);

        pool.release(handle).await.unwrap();
        pool.release(twin).await.unwrap();

        let stats = pool.stats();
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.checked_out, 0);
        let queued: Vec<HandleId> = pool.inner.idle.lock().iter().map(PublishHandle::id).collect();
        assert_eq!(queued.iter().filter(|queued| **queued == id).count(), 1);
    }

    #[tokio::test]
    async fn test_overflowing_release_closes_handle() {
        let broker = MemoryBroker::new();
        let pool = pool(&broker, 1).await;

        let settings = pool.inner.factory.settings.clone();
        let extra_client = broker.connect(&settings).await.unwrap();
        let extra = PublishHandle::new(HandleId::new(99), pool.id(), pool.topic().clone(), extra_client);

        pool.release(extra).await.unwrap();

        assert_eq!(pool.stats().idle, 1);
        assert_eq!(pool.stats().closed, 1);
        assert_eq!(broker.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let err = HandlePool::new(
            Topic::new("orders").unwrap(),
            0,
            EndpointList::default(),
            Arc::new(MemoryBroker::new()),
            PoolOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
