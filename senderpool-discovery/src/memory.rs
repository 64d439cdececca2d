//! In-memory coordination tree.
//!
//! Useful for tests and for embedding SenderPool where the broker topology is
//! known up front but the discovery path should still be exercised.

use crate::tree::{CoordinationTree, TreeConnector, TreeError, TreeResult};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct TreeState {
    nodes: RwLock<BTreeMap<String, Bytes>>,
    poisoned: RwLock<HashSet<String>>,
    refuse_connections: AtomicU32,
    connect_attempts: AtomicUsize,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
}

/// A shared, mutable tree of nodes. Clones share the same nodes.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    state: Arc<TreeState>,
}

impl MemoryTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` at `path`, replacing any previous payload.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.state.nodes.write().insert(path.into(), data.into());
    }

    /// Delete the node at `path`. Descendants are left alone.
    pub fn remove(&self, path: &str) {
        self.state.nodes.write().remove(path);
    }

    /// Register partitions `0..leaders.len()` of `topic`, partition `i` led
    /// by `leaders[i]`.
    #[must_use]
    pub fn with_partition_leaders(self, root: &str, topic: &str, leaders: &[i32]) -> Self {
        for (partition, leader) in leaders.iter().enumerate() {
            self.insert(
                format!("{root}/topics/{topic}/partitions/{partition}/state"),
                format!(
                    r#"{{"controller_epoch":1,"isr":[{leader}],"leader":{leader},"leader_epoch":0,"version":1}}"#
                ),
            );
        }
        self
    }

    /// Register broker `id` at `host:port`.
    #[must_use]
    pub fn with_broker(self, root: &str, id: i32, host: &str, port: u16) -> Self {
        self.insert(
            format!("{root}/ids/{id}"),
            format!(r#"{{"host":"{host}","jmx_port":-1,"port":{port},"version":1}}"#),
        );
        self
    }

    /// Make reads of `path` fail with a connection error.
    pub fn poison(&self, path: impl Into<String>) {
        self.state.poisoned.write().insert(path.into());
    }

    /// Refuse the next `attempts` connection attempts.
    pub fn refuse_connections(&self, attempts: u32) {
        self.state.refuse_connections.store(attempts, Ordering::SeqCst);
    }

    /// Connection attempts so far, refused ones included.
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.state.sessions_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TreeConnector for MemoryTree {
    async fn connect(&self, connection_string: &str) -> TreeResult<Box<dyn CoordinationTree>> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .state
            .refuse_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TreeError::Connection(format!("{connection_string} refused the connection")));
        }

        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession { state: Arc::clone(&self.state), closed: AtomicBool::new(false) }))
    }
}

struct MemorySession {
    state: Arc<TreeState>,
    closed: AtomicBool,
}

impl MemorySession {
    fn check_open(&self, path: &str) -> TreeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TreeError::Connection("session closed".to_string()));
        }
        if self.state.poisoned.read().contains(path) {
            return Err(TreeError::Connection(format!("read of {path} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationTree for MemorySession {
    async fn children(&self, path: &str) -> TreeResult<Vec<String>> {
        self.check_open(path)?;

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let nodes = self.state.nodes.read();
        let exists = nodes.contains_key(path);

        let children: BTreeSet<String> = nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| key[prefix.len()..].split('/').next().map(str::to_string))
            .filter(|name| !name.is_empty())
            .collect();

        if !exists && children.is_empty() {
            return Err(TreeError::NoNode(path.to_string()));
        }
        Ok(children.into_iter().collect())
    }

    async fn data(&self, path: &str) -> TreeResult<Bytes> {
        self.check_open(path)?;

        let nodes = self.state.nodes.read();
        if let Some(data) = nodes.get(path) {
            return Ok(data.clone());
        }

        // Intermediate nodes exist implicitly and carry no payload.
        let prefix = format!("{path}/");
        if nodes.range(prefix.clone()..).next().is_some_and(|(key, _)| key.starts_with(&prefix)) {
            return Ok(Bytes::new());
        }

        Err(TreeError::NoNode(path.to_string()))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_children_lists_direct_descendants_once() {
        let tree = MemoryTree::new().with_partition_leaders("/brokers", "orders", &[5, 7, 5]);
        let session = tree.connect("zk:2181").await.unwrap();

        let children = session.children("/brokers/topics/orders/partitions").await.unwrap();
        assert_eq!(children, vec!["0", "1", "2"]);

        let err = session.children("/brokers/topics/payments/partitions").await.unwrap_err();
        assert!(matches!(err, TreeError::NoNode(_)));
    }

    #[tokio::test]
    async fn test_refused_connections_are_counted() {
        let tree = MemoryTree::new();
        tree.refuse_connections(2);

        assert!(tree.connect("zk").await.is_err());
        assert!(tree.connect("zk").await.is_err());
        assert!(tree.connect("zk").await.is_ok());
        assert_eq!(tree.connect_attempts(), 3);
        assert_eq!(tree.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_reads() {
        let tree = MemoryTree::new().with_broker("/brokers", 1, "h1", 9092);
        let session = tree.connect("zk").await.unwrap();
        session.close().await;
        session.close().await;

        assert!(matches!(session.data("/brokers/ids/1").await, Err(TreeError::Connection(_))));
        assert_eq!(tree.sessions_closed(), 1);
    }
}
