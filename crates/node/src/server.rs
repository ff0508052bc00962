//! Client accept loop.

use crate::connection::serve_connection;
use crate::error::Result;
use crate::state::NodeState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Signals a running [`KvServer`] to shut down.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn close(&self) {
        // Err only means the server already exited.
        let _ = self.tx.send(true);
    }
}

/// Accepts client and replica connections for one node.
pub struct KvServer {
    state: Arc<NodeState>,
    listener: TcpListener,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl KvServer {
    pub async fn bind(state: Arc<NodeState>, addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::with_listener(state, listener))
    }

    /// Wraps an already bound listener, e.g. one bound to port 0 before the
    /// node's identity was known.
    pub fn with_listener(state: Arc<NodeState>, listener: TcpListener) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            state,
            listener,
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Runs until shut down. On exit the listening socket is closed and the
    /// node state is released; in-flight connections finish on their own.
    pub async fn run(self) -> Result<()> {
        let KvServer {
            state,
            listener,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;
        info!(node = %state.self_node(), addr = ?listener.local_addr().ok(), "server listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "accepted connection");
                            metrics::counter!("node_connections_total").increment(1);
                            let state = state.clone();
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(state, stream).await {
                                    warn!(%peer, error = %e, "connection failed");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        drop(listener);
        state.close().await;
        info!(node = %state.self_node().name(), "server stopped");
        Ok(())
    }
}
