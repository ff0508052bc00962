//! Replica link management.
//!
//! The manager owns this node's outbound replica links and reconciles them
//! against the ring whenever topology changes. Reconciliation is a set diff:
//! links to targets that stay in the replica set are never reopened unless
//! they have broken.

use crate::error::{ForwardError, ForwardFailure, ReplicationError};
use crate::link::{ReplicaConnector, ReplicaLink};
use crate::strategy::ReplicationStrategy;
use corelib::{HashRing, RingHash, RingNode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Outcome of one [`ReplicaForwarderManager::update`] call, by node name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub connected: Vec<String>,
    pub disconnected: Vec<String>,
    pub failed: Vec<String>,
}

impl UpdateSummary {
    pub fn is_unchanged(&self) -> bool {
        self.connected.is_empty() && self.disconnected.is_empty() && self.failed.is_empty()
    }
}

/// Upper bound on one replica acknowledgement or connection attempt.
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Keeps the replica links of one node consistent with the ring.
///
/// `forward` fans out over a snapshot of the link set taken under the read
/// lock, so reconciliation never waits on replica I/O. A link removed while a
/// forward still holds it is disconnected only after that forward releases
/// the link's stream.
pub struct ReplicaForwarderManager {
    self_node: RingNode,
    strategy: Box<dyn ReplicationStrategy>,
    connector: Arc<dyn ReplicaConnector>,
    links: RwLock<HashMap<RingHash, Arc<dyn ReplicaLink>>>,
    link_timeout: Duration,
    // Serializes reconciliations so two updates cannot interleave their diffs.
    update_lock: Mutex<()>,
}

impl ReplicaForwarderManager {
    pub fn new(
        self_node: RingNode,
        strategy: Box<dyn ReplicationStrategy>,
        connector: Arc<dyn ReplicaConnector>,
    ) -> Self {
        Self {
            self_node,
            strategy,
            connector,
            links: RwLock::new(HashMap::new()),
            link_timeout: DEFAULT_LINK_TIMEOUT,
            update_lock: Mutex::new(()),
        }
    }

    pub fn with_link_timeout(mut self, link_timeout: Duration) -> Self {
        self.link_timeout = link_timeout;
        self
    }

    pub fn self_node(&self) -> &RingNode {
        &self.self_node
    }

    pub fn strategy(&self) -> &dyn ReplicationStrategy {
        self.strategy.as_ref()
    }

    /// Reconciles the link set with `ring`.
    ///
    /// Links to nodes that left the replica set are dropped and disconnected,
    /// links are opened to nodes that joined it, and every other link is left
    /// as is. Links that report themselves broken are replaced and appear in
    /// both [`UpdateSummary::disconnected`] and [`UpdateSummary::connected`].
    /// A target that cannot be reached is reported in
    /// [`UpdateSummary::failed`] and retried on the next update.
    pub async fn update(&self, ring: &HashRing) -> UpdateSummary {
        let _reconciling = self.update_lock.lock().await;
        self.reconcile(ring).await
    }

    /// Reconciles against the ring returned by `current`, read only once any
    /// reconciliation in progress has finished.
    ///
    /// Concurrent callers therefore always converge on the newest ring, no
    /// matter in which order they acquire the lock.
    pub async fn update_from<F>(&self, current: F) -> UpdateSummary
    where
        F: FnOnce() -> HashRing + Send,
    {
        let _reconciling = self.update_lock.lock().await;
        let ring = current();
        self.reconcile(&ring).await
    }

    async fn reconcile(&self, ring: &HashRing) -> UpdateSummary {
        let targets: Vec<RingNode> = self
            .strategy
            .replica_targets(ring, &self.self_node)
            .into_iter()
            .cloned()
            .collect();
        let wanted: HashSet<RingHash> = targets.iter().map(RingNode::hash).collect();
        let mut summary = UpdateSummary::default();

        let stale: Vec<Arc<dyn ReplicaLink>> = {
            let mut links = self.links.write().await;
            let gone: Vec<RingHash> = links
                .keys()
                .filter(|hash| !wanted.contains(*hash))
                .copied()
                .collect();
            let broken: Vec<RingHash> = links
                .iter()
                .filter(|(hash, link)| wanted.contains(*hash) && !link.is_connected())
                .map(|(hash, _)| *hash)
                .collect();
            let gone: Vec<RingHash> = gone.into_iter().chain(broken).collect();
            gone.iter().filter_map(|hash| links.remove(hash)).collect()
        };
        for link in stale {
            link.disconnect().await;
            summary.disconnected.push(link.target().name().to_string());
        }

        let missing: Vec<RingNode> = {
            let links = self.links.read().await;
            targets
                .into_iter()
                .filter(|target| !links.contains_key(&target.hash()))
                .collect()
        };
        for target in missing {
            // Connect outside the lock so forwards keep flowing to live links.
            let attempt = match timeout(self.link_timeout, self.connector.connect(&target)).await {
                Ok(attempt) => attempt,
                Err(_) => Err(ReplicationError::Timeout {
                    target: target.name().to_string(),
                    timeout: self.link_timeout,
                }),
            };
            match attempt {
                Ok(link) => {
                    self.links.write().await.insert(target.hash(), link);
                    summary.connected.push(target.name().to_string());
                }
                Err(e) => {
                    warn!(replica = %target, error = %e, "failed to open replica link");
                    summary.failed.push(target.name().to_string());
                }
            }
        }

        if summary.is_unchanged() {
            debug!(node = %self.self_node.name(), "replica set unchanged");
        } else {
            info!(
                node = %self.self_node.name(),
                connected = ?summary.connected,
                disconnected = ?summary.disconnected,
                failed = ?summary.failed,
                "reconciled replica links"
            );
        }
        summary
    }

    /// Sends one write to every connected replica.
    ///
    /// Every link is attempted even after a failure, and each one gets at most
    /// the link timeout to acknowledge. Returns the number of replicas that
    /// acknowledged, or the per-target failures.
    pub async fn forward(&self, key: &str, value: &str) -> Result<usize, ForwardError> {
        let links: Vec<Arc<dyn ReplicaLink>> = self.links.read().await.values().cloned().collect();
        let mut delivered = 0;
        let mut failures = Vec::new();

        for link in &links {
            let outcome = match timeout(self.link_timeout, link.forward(key, value)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ReplicationError::Timeout {
                    target: link.target().name().to_string(),
                    timeout: self.link_timeout,
                }),
            };
            match outcome {
                Ok(()) => {
                    delivered += 1;
                    metrics::counter!("replication_forwarded_total").increment(1);
                }
                Err(error) => {
                    metrics::counter!("replication_forward_failures_total").increment(1);
                    failures.push(ForwardFailure {
                        target: link.target().name().to_string(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(delivered)
        } else {
            Err(ForwardError {
                delivered,
                failures,
            })
        }
    }

    /// Disconnects and drops every link.
    pub async fn clear(&self) {
        let drained: Vec<Arc<dyn ReplicaLink>> = {
            let mut links = self.links.write().await;
            links.drain().map(|(_, link)| link).collect()
        };
        for link in &drained {
            link.disconnect().await;
        }
        if !drained.is_empty() {
            info!(node = %self.self_node.name(), count = drained.len(), "cleared replica links");
        }
    }

    /// Currently linked targets in ascending hash order.
    pub async fn targets(&self) -> Vec<RingNode> {
        let links = self.links.read().await;
        let mut targets: Vec<RingNode> = links.values().map(|l| l.target().clone()).collect();
        targets.sort_by_key(RingNode::hash);
        targets
    }

    pub async fn link_for(&self, name: &str) -> Option<Arc<dyn ReplicaLink>> {
        let links = self.links.read().await;
        links
            .values()
            .find(|link| link.target().name() == name)
            .cloned()
    }
}
