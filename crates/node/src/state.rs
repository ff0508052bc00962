//! Shared node state.
//!
//! One [`NodeState`] is shared by every connection task, the migration
//! receiver and the coordinator.
//!
//! # Locking
//!
//! - `status` is held for reading across a whole engine call, so
//!   [`NodeState::lock_write`] only returns once in-flight writes are done
//! - The engine has its own single critical section. Engine calls run on
//!   the blocking pool, with the status guard taken on that thread
//! - `ring` is written only by the coordinator
//! - Replica links are guarded inside the forwarder

use crate::config::NodeConfig;
use crate::error::Result;
use crate::status::NodeStatus;
use corelib::{HashRing, RingHash, RingNode};
use parking_lot::RwLock;
use replication::{
    ReplicaConnector, ReplicaForwarderManager, SimpleStrategy, TcpConnector, UpdateSummary,
};
use std::sync::Arc;
use storage::{StorageEngine, WriteOutcome};
use streaming::{Request, Response};
use tracing::{debug, info, warn};

pub struct NodeState {
    self_node: RingNode,
    status: RwLock<NodeStatus>,
    engine: Arc<StorageEngine>,
    ring: RwLock<HashRing>,
    forwarder: ReplicaForwarderManager,
}

impl NodeState {
    pub fn new(self_node: RingNode, engine: Arc<StorageEngine>, forwarder: ReplicaForwarderManager) -> Self {
        Self {
            self_node,
            status: RwLock::new(NodeStatus::default()),
            engine,
            ring: RwLock::new(HashRing::new()),
            forwarder,
        }
    }

    /// Opens the node's store and wires replication over TCP.
    pub fn open(config: &NodeConfig) -> Result<Self> {
        Self::open_with_connector(config, Arc::new(TcpConnector))
    }

    pub fn open_with_connector(config: &NodeConfig, connector: Arc<dyn ReplicaConnector>) -> Result<Self> {
        let strategy = config.metadata.strategy()?;
        let engine = StorageEngine::open(&config.data_dir, strategy, config.metadata.cache_size)?;
        let self_node = config.self_node();
        let forwarder = ReplicaForwarderManager::new(
            self_node.clone(),
            Box::new(SimpleStrategy::default()),
            connector,
        );
        info!(node = %self_node, %strategy, cache_size = config.metadata.cache_size, "node state opened");
        Ok(Self::new(self_node, Arc::new(engine), forwarder))
    }

    pub fn self_node(&self) -> &RingNode {
        &self.self_node
    }

    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    pub fn forwarder(&self) -> &ReplicaForwarderManager {
        &self.forwarder
    }

    pub fn status(&self) -> NodeStatus {
        *self.status.read()
    }

    pub fn start(&self) {
        self.set_status(NodeStatus::Running);
    }

    pub fn stop(&self) {
        self.set_status(NodeStatus::Stopped);
    }

    /// Blocks writes. Waits for writes already holding the status lock.
    pub fn lock_write(&self) {
        self.set_status(NodeStatus::WriteLocked);
    }

    pub fn unlock_write(&self) {
        self.set_status(NodeStatus::Running);
    }

    pub(crate) fn set_status(&self, next: NodeStatus) {
        let mut status = self.status.write();
        if *status != next {
            info!(node = %self.self_node.name(), from = %*status, to = %next, "status change");
            *status = next;
        }
    }

    pub fn ring_snapshot(&self) -> HashRing {
        self.ring.read().clone()
    }

    pub fn replace_ring(&self, ring: HashRing) {
        debug!(node = %self.self_node.name(), nodes = ring.len(), "ring replaced");
        *self.ring.write() = ring;
    }

    /// Brings the replica links in line with the current ring. The ring is
    /// read only after earlier reconciliations finish, so overlapping calls
    /// settle on the newest ring.
    pub async fn reconcile_replicas(&self) -> UpdateSummary {
        self.forwarder.update_from(|| self.ring_snapshot()).await
    }

    /// Whether this node may serve `key`. Writes need ownership, reads accept
    /// replicated ranges too. A node absent from the ring serves everything.
    fn responsible_for(&self, key: &str, write: bool) -> bool {
        let ring = self.ring.read();
        if ring.node_at(self.self_node.hash()).is_none() {
            return true;
        }
        if write {
            ring.owner_of_key(key)
                .map_or(false, |owner| owner.hash() == self.self_node.hash())
        } else {
            ring.responsible_range(&self.self_node)
                .map_or(false, |range| range.contains(RingHash::from_key(key)))
        }
    }

    /// Serves one client or replica request.
    pub async fn handle(self: &Arc<Self>, request: Request) -> Response {
        match request {
            Request::Get { key } => {
                let state = Arc::clone(self);
                let fallback = key.clone();
                tokio::task::spawn_blocking(move || state.get(key))
                    .await
                    .unwrap_or_else(|e| Response::GetError {
                        key: fallback,
                        reason: e.to_string(),
                    })
            }
            Request::Put { key, value } => self.put(key, value).await,
            Request::Replicate { key, value } => {
                let state = Arc::clone(self);
                let fallback = key.clone();
                tokio::task::spawn_blocking(move || state.replicate(key, value))
                    .await
                    .unwrap_or_else(|e| Response::PutError {
                        key: fallback,
                        reason: e.to_string(),
                    })
            }
        }
    }

    fn get(&self, key: String) -> Response {
        let status = self.status.read();
        if !status.accepts_reads() {
            return Response::ServerStopped;
        }
        if !self.responsible_for(&key, false) {
            return Response::NotResponsible { key };
        }
        match self.engine.read(&key) {
            Ok(Some(value)) => Response::GetSuccess { key, value },
            Ok(None) => Response::GetError {
                key,
                reason: "key not found".to_string(),
            },
            Err(e) => Response::GetError {
                key,
                reason: e.to_string(),
            },
        }
    }

    async fn put(self: &Arc<Self>, key: String, value: String) -> Response {
        let written = {
            let state = Arc::clone(self);
            let (key, value) = (key.clone(), value.clone());
            tokio::task::spawn_blocking(move || state.write_local(&key, &value)).await
        };

        let outcome = match written {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(refused)) => return refused,
            Err(e) => {
                return Response::PutError {
                    key,
                    reason: e.to_string(),
                }
            }
        };

        // The local write stands even if some replicas miss it.
        if let Err(e) = self.forwarder.forward(&key, &value).await {
            warn!(key = %key, error = %e, "replication incomplete");
        }

        match outcome {
            WriteOutcome::Inserted => Response::PutSuccess { key },
            WriteOutcome::Updated => Response::PutUpdate { key },
        }
    }

    /// Local half of a put. The status read guard spans the engine write.
    fn write_local(&self, key: &str, value: &str) -> std::result::Result<WriteOutcome, Response> {
        let status = self.status.read();
        match *status {
            NodeStatus::Stopped => return Err(Response::ServerStopped),
            NodeStatus::WriteLocked => return Err(Response::ServerWriteLock),
            NodeStatus::Running => {}
        }
        if !self.responsible_for(key, true) {
            return Err(Response::NotResponsible {
                key: key.to_string(),
            });
        }
        self.engine.write(key, value).map_err(|e| Response::PutError {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn replicate(&self, key: String, value: String) -> Response {
        let status = self.status.read();
        if !status.accepts_reads() {
            return Response::ServerStopped;
        }
        match self.engine.write(&key, &value) {
            Ok(_) => {
                metrics::counter!("node_replicated_writes_total").increment(1);
                Response::ReplicateAck { key }
            }
            Err(e) => Response::PutError {
                key,
                reason: e.to_string(),
            },
        }
    }

    /// Releases the resources tied to serving: status, replica links, cache.
    pub async fn close(&self) {
        self.stop();
        self.forwarder.clear().await;
        self.engine.clear_cache();
        info!(node = %self.self_node.name(), "node closed");
    }
}
