//! Outbound replica connections.

use crate::error::{ReplicationError, Result};
use async_trait::async_trait;
use corelib::RingNode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use streaming::{read_frame, write_frame, Request, Response};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// An open connection carrying this node's writes to one replica.
#[async_trait]
pub trait ReplicaLink: Send + Sync {
    /// The node this link delivers to.
    fn target(&self) -> &RingNode;

    /// Whether the link can still carry writes. A link that reports `false`
    /// is replaced on the next reconciliation.
    fn is_connected(&self) -> bool;

    /// Delivers one write and waits for the replica to acknowledge it.
    async fn forward(&self, key: &str, value: &str) -> Result<()>;

    /// Closes the connection. Further forwards fail.
    async fn disconnect(&self);
}

/// Opens links to replica targets.
#[async_trait]
pub trait ReplicaConnector: Send + Sync {
    async fn connect(&self, target: &RingNode) -> Result<Arc<dyn ReplicaLink>>;
}

/// Replica link over the node service port.
///
/// A stream that fails mid-exchange is dropped and reopened by the next
/// forward. Only [`ReplicaLink::disconnect`] closes the link for good.
pub struct TcpReplicaLink {
    target: RingNode,
    stream: Mutex<Option<TcpStream>>,
    healthy: AtomicBool,
    closed: AtomicBool,
}

impl TcpReplicaLink {
    pub async fn connect(target: RingNode) -> Result<Self> {
        let stream = open_stream(&target).await?;
        info!(replica = %target, "connected replica link");
        Ok(Self {
            target,
            stream: Mutex::new(Some(stream)),
            healthy: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        })
    }

    fn disconnected(&self) -> ReplicationError {
        ReplicationError::Disconnected(self.target.name().to_string())
    }
}

async fn open_stream(target: &RingNode) -> Result<TcpStream> {
    let stream = TcpStream::connect(target.address())
        .await
        .map_err(|source| ReplicationError::Connect {
            target: target.name().to_string(),
            source,
        })?;
    stream.set_nodelay(true).ok();
    Ok(stream)
}

async fn exchange(stream: &mut TcpStream, key: &str, value: &str) -> Result<Option<Response>> {
    let request = Request::Replicate {
        key: key.to_string(),
        value: value.to_string(),
    };
    write_frame(stream, &request).await?;
    Ok(read_frame(stream).await?)
}

#[async_trait]
impl ReplicaLink for TcpReplicaLink {
    fn target(&self) -> &RingNode {
        &self.target
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.healthy.load(Ordering::Acquire)
    }

    async fn forward(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.stream.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(self.disconnected());
        }

        // The stream is held outside the slot while a request is in flight, so
        // an exchange that errors or is cancelled never leaves a half-read
        // stream behind.
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => match open_stream(&self.target).await {
                Ok(stream) => {
                    info!(replica = %self.target, "reopened replica link");
                    stream
                }
                Err(e) => {
                    self.healthy.store(false, Ordering::Release);
                    return Err(e);
                }
            },
        };

        let response = match exchange(&mut stream, key, value).await {
            Ok(response) => response,
            Err(e) => {
                warn!(replica = %self.target.name(), error = %e, "replica link broken");
                self.healthy.store(false, Ordering::Release);
                return Err(e);
            }
        };

        match response {
            Some(Response::ReplicateAck { .. }) => {
                *guard = Some(stream);
                self.healthy.store(true, Ordering::Release);
                debug!(replica = %self.target.name(), key, "replica acknowledged write");
                Ok(())
            }
            Some(other) => {
                *guard = Some(stream);
                Err(ReplicationError::Rejected {
                    target: self.target.name().to_string(),
                    reason: format!("{:?}", other),
                })
            }
            None => {
                self.healthy.store(false, Ordering::Release);
                Err(self.disconnected())
            }
        }
    }

    async fn disconnect(&self) {
        self.closed.store(true, Ordering::Release);
        if self.stream.lock().await.take().is_some() {
            info!(replica = %self.target, "disconnected replica link");
        }
    }
}

/// Connector producing [`TcpReplicaLink`]s.
#[derive(Debug, Default, Clone)]
pub struct TcpConnector;

#[async_trait]
impl ReplicaConnector for TcpConnector {
    async fn connect(&self, target: &RingNode) -> Result<Arc<dyn ReplicaLink>> {
        let link = TcpReplicaLink::connect(target.clone()).await?;
        Ok(Arc::new(link))
    }
}
