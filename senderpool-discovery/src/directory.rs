//! Partition-leader endpoint resolution.

use crate::{
    records::{BrokerRegistration, PartitionState},
    retry::{connect_with_retry, RetryPolicy},
    tree::{CoordinationTree, TreeConnector, TreeError},
};
use senderpool_core::{
    config::DiscoverySettings, BrokerId, EndpointList, Error, PartitionId, Result, Topic,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Node layout under the configured root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePaths {
    root: String,
    topic: String,
}

impl TreePaths {
    /// Paths for `topic` under `root`. A trailing `/` on the root is ignored.
    #[must_use]
    pub fn new(root: &str, topic: &Topic) -> Self {
        Self { root: root.trim_end_matches('/').to_string(), topic: topic.as_str().to_string() }
    }

    /// `<root>/topics/<topic>/partitions`
    #[must_use]
    pub fn partitions(&self) -> String {
        format!("{}/topics/{}/partitions", self.root, self.topic)
    }

    /// `<root>/topics/<topic>/partitions/<p>/state`
    #[must_use]
    pub fn partition_state(&self, partition: PartitionId) -> String {
        format!("{}/{partition}/state", self.partitions())
    }

    /// `<root>/ids/<broker>`
    #[must_use]
    pub fn broker(&self, broker: BrokerId) -> String {
        format!("{}/ids/{broker}", self.root)
    }
}

/// Resolves the leader endpoint of every partition of a topic.
///
/// Each resolution opens its own coordination session and closes it before
/// returning, whatever the outcome.
#[derive(Clone)]
pub struct EndpointDirectory {
    connector: Arc<dyn TreeConnector>,
}

impl std::fmt::Debug for EndpointDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointDirectory").finish_non_exhaustive()
    }
}

impl EndpointDirectory {
    /// Create a directory reading through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn TreeConnector>) -> Self {
        Self { connector }
    }

    /// Leader endpoints of `topic`, in ascending partition order.
    ///
    /// A partition whose state node or leader registration is missing, or
    /// whose leader advertises a port outside `1..=65535`, is logged and left
    /// out. The list may therefore be shorter than the partition count, or
    /// empty.
    ///
    /// # Errors
    /// Returns [`Error::Discovery`] if the coordination service stays
    /// unreachable, the topic's partitions node is missing, a read fails for
    /// any reason other than a missing node, or a record is malformed.
    pub async fn resolve(&self, settings: &DiscoverySettings, topic: &Topic) -> Result<EndpointList> {
        let tree = connect_with_retry(
            self.connector.as_ref(),
            &settings.connection_string,
            RetryPolicy::from(settings),
        )
        .await?;

        let paths = TreePaths::new(&settings.root_path, topic);
        let resolved = read_leader_endpoints(tree.as_ref(), &paths).await;
        tree.close().await;

        let endpoints = resolved?;
        info!(%topic, "Read partition info from coordination service: {endpoints}");
        Ok(endpoints)
    }

    /// Same as [`resolve`](Self::resolve), rendered as `host:port,host:port`.
    ///
    /// # Errors
    /// See [`resolve`](Self::resolve).
    pub async fn resolve_string(&self, settings: &DiscoverySettings, topic: &Topic) -> Result<String> {
        Ok(self.resolve(settings, topic).await?.to_string())
    }
}

async fn read_leader_endpoints(tree: &dyn CoordinationTree, paths: &TreePaths) -> Result<EndpointList> {
    let partitions_path = paths.partitions();
    let partitions = tree
        .children(&partitions_path)
        .await
        .map_err(|e| Error::discovery(format!("can't list partitions at {partitions_path}: {e}")))?;
    let count = u32::try_from(partitions.len())
        .map_err(|_| Error::discovery(format!("too many partitions under {partitions_path}")))?;

    let mut endpoints = EndpointList::default();
    for partition in (0..count).map(PartitionId::new) {
        let state_path = paths.partition_state(partition);
        let Some(payload) = read_optional(tree, &state_path).await? else {
            error!(%partition, "Node {state_path} does not exist");
            continue;
        };
        let leader = PartitionState::parse(&state_path, &payload)?.leader();

        let broker_path = paths.broker(leader);
        let Some(payload) = read_optional(tree, &broker_path).await? else {
            error!(%partition, %leader, "Node {broker_path} does not exist");
            continue;
        };
        let registration = BrokerRegistration::parse(&broker_path, &payload)?;
        let Some(endpoint) = registration.endpoint() else {
            error!(%partition, %leader, port = registration.port, "Node {broker_path} has no usable port");
            continue;
        };

        debug!(%partition, %leader, %endpoint, "Resolved partition leader");
        endpoints.push(endpoint);
    }

    Ok(endpoints)
}

/// `Ok(None)` for a missing node, a discovery error for anything else.
async fn read_optional(tree: &dyn CoordinationTree, path: &str) -> Result<Option<bytes::Bytes>> {
    match tree.data(path).await {
        Ok(payload) => Ok(Some(payload)),
        Err(TreeError::NoNode(_)) => Ok(None),
        Err(e) => Err(Error::discovery(format!("can't read {path}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_paths() {
        let topic = Topic::new("orders").unwrap();
        let paths = TreePaths::new("/brokers/", &topic);

        assert_eq!(paths.partitions(), "/brokers/topics/orders/partitions");
        assert_eq!(paths.partition_state(PartitionId(3)), "/brokers/topics/orders/partitions/3/state");
        assert_eq!(paths.broker(BrokerId(5)), "/brokers/ids/5");
    }
}
