//! Outbound side of a data migration.

use crate::codec::{read_frame, write_frame};
use crate::error::{Result, StreamingError};
use crate::protocol::{Transfer, TransferAck};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Streams key/value pairs to a peer's [`MigrationReceiver`].
///
/// [`MigrationReceiver`]: crate::receiver::MigrationReceiver
#[derive(Debug, Clone)]
pub struct MigrationSender {
    target: String,
}

impl MigrationSender {
    /// `target` is the `host:port` the receiver published.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Sends every pair, then waits for the receiver to acknowledge the count.
    ///
    /// Returns the number of pairs sent.
    pub async fn send<I>(&self, entries: I) -> Result<u64>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        info!(peer = %self.target, "starting data migration");
        let stream = TcpStream::connect(&self.target).await?;
        let mut stream = BufWriter::new(stream);

        let mut sent = 0u64;
        for (key, value) in entries {
            debug!(key = %key, "migrating entry");
            write_frame(&mut stream, &Transfer::Entry { key, value }).await?;
            sent += 1;
        }
        write_frame(&mut stream, &Transfer::Done).await?;
        stream.flush().await?;

        let ack: TransferAck = read_frame(&mut stream)
            .await?
            .ok_or(StreamingError::ConnectionClosed)?;
        if ack.received != sent {
            return Err(StreamingError::TransferMismatch {
                sent,
                acknowledged: ack.received,
            });
        }
        info!(peer = %self.target, sent, "data migration complete");
        Ok(sent)
    }
}
