//! Inbound side of a data migration.

use crate::codec::{read_frame, write_frame};
use crate::error::{Result, StreamingError};
use crate::protocol::{Transfer, TransferAck};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// How long a receiver waits for its sender before giving up.
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Destination for migrated pairs.
///
/// `store` may block; the receiver calls it from the blocking pool.
pub trait EntrySink: Send + Sync {
    fn store(&self, key: &str, value: &str) -> Result<()>;
}

/// Ephemeral listener accepting one migration stream.
pub struct MigrationReceiver {
    listener: TcpListener,
    port: u16,
    accept_timeout: Duration,
}

impl MigrationReceiver {
    /// Binds an OS-assigned port on `host`.
    pub async fn bind(host: &str) -> Result<Self> {
        let listener = TcpListener::bind((host, 0)).await?;
        let port = listener.local_addr()?.port();
        info!(host, port, "migration receiver listening");
        Ok(Self {
            listener,
            port,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
        })
    }

    pub fn with_accept_timeout(mut self, accept_timeout: Duration) -> Self {
        self.accept_timeout = accept_timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accepts a single sender and stores every pair it streams.
    ///
    /// Returns the number of pairs stored once the sender signals the end of
    /// the stream. Fails with [`StreamingError::AcceptTimeout`] if no sender
    /// shows up in time. The listener is closed when this returns.
    pub async fn run(self, sink: Arc<dyn EntrySink>) -> Result<u64> {
        let (mut stream, peer) = tokio::time::timeout(self.accept_timeout, self.listener.accept())
            .await
            .map_err(|_| StreamingError::AcceptTimeout(self.accept_timeout))??;
        info!(%peer, port = self.port, "accepted migration stream");

        let mut received = 0u64;
        loop {
            match read_frame::<_, Transfer>(&mut stream).await? {
                Some(Transfer::Entry { key, value }) => {
                    debug!(key = %key, "received migrated entry");
                    let sink = Arc::clone(&sink);
                    tokio::task::spawn_blocking(move || sink.store(&key, &value))
                        .await
                        .map_err(|e| StreamingError::Sink(e.to_string()))??;
                    received += 1;
                    metrics::counter!("streaming_migrated_entries_total").increment(1);
                }
                Some(Transfer::Done) => {
                    write_frame(&mut stream, &TransferAck { received }).await?;
                    info!(%peer, received, "migration stream finished");
                    return Ok(received);
                }
                None => return Err(StreamingError::ConnectionClosed),
            }
        }
    }
}
