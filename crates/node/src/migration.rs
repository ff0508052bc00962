//! Range migration between nodes.

use crate::error::{NodeError, Result};
use corelib::{HashRange, RingHash};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::StorageEngine;
use streaming::{EntrySink, MigrationSender, StreamingError};
use tracing::info;

/// Stores migrated pairs through the engine, bypassing status checks.
pub struct EngineSink(pub Arc<StorageEngine>);

impl EntrySink for EngineSink {
    fn store(&self, key: &str, value: &str) -> streaming::Result<()> {
        self.0
            .write(key, value)
            .map(|_| ())
            .map_err(|e| StreamingError::Sink(e.to_string()))
    }
}

/// Data of a `Send` command: where to stream which range.
///
/// Bounds are hex hashes, as printed by [`RingHash`]'s `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOrder {
    pub host: String,
    pub port: u16,
    pub lower: String,
    pub upper: String,
}

impl MigrationOrder {
    pub fn new(host: impl Into<String>, port: u16, range: HashRange) -> Self {
        Self {
            host: host.into(),
            port,
            lower: range.lower.to_string(),
            upper: range.upper.to_string(),
        }
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// The `(lower, upper]` range to move.
    pub fn range(&self) -> Result<HashRange> {
        let lower = RingHash::from_hex(&self.lower).map_err(NodeError::Ring)?;
        let upper = RingHash::from_hex(&self.upper).map_err(NodeError::Ring)?;
        Ok(HashRange::new(lower, upper))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Streams every persisted pair whose key hashes into the order's range.
/// Returns the number of pairs the receiver acknowledged.
pub async fn send_range(engine: Arc<StorageEngine>, order: MigrationOrder) -> Result<u64> {
    let range = order.range()?;
    let entries = tokio::task::spawn_blocking(move || -> Result<Vec<(String, String)>> {
        Ok(engine
            .entries()?
            .into_iter()
            .filter(|(key, _)| range.contains(RingHash::from_key(key)))
            .collect())
    })
    .await??;
    info!(range = %range, peer = %order.address(), count = entries.len(), "sending range");
    Ok(MigrationSender::new(order.address()).send(entries).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{CacheStrategy, SledStore};
    use streaming::MigrationReceiver;

    fn engine() -> Arc<StorageEngine> {
        let store = SledStore::temporary().unwrap();
        Arc::new(StorageEngine::new(Arc::new(store), CacheStrategy::Fifo, 4).unwrap())
    }

    #[test]
    fn test_order_json() {
        let range = HashRange::new(RingHash(1), RingHash(u128::MAX));
        let order = MigrationOrder::new("127.0.0.1", 4000, range);
        let decoded = MigrationOrder::from_json(&order.to_json().unwrap()).unwrap();
        assert_eq!(decoded.range().unwrap(), range);
        assert_eq!(decoded.address(), "127.0.0.1:4000");
    }

    #[test]
    fn test_order_bad_hash() {
        let order = MigrationOrder {
            host: "h".into(),
            port: 1,
            lower: "xyz".into(),
            upper: "0".into(),
        };
        assert!(matches!(order.range(), Err(NodeError::Ring(_))));
    }

    #[tokio::test]
    async fn test_send_range_filters_by_hash() {
        let source = engine();
        let keys: Vec<String> = (0..40).map(|i| format!("key{}", i)).collect();
        for key in &keys {
            source.write(key, "v").unwrap();
        }
        // Half of the ring, split at the midpoint.
        let range = HashRange::new(RingHash(0), RingHash(u128::MAX / 2));
        let expected: Vec<&String> = keys
            .iter()
            .filter(|k| range.contains(RingHash::from_key(k)))
            .collect();

        let target = engine();
        let receiver = MigrationReceiver::bind("127.0.0.1").await.unwrap();
        let order = MigrationOrder::new("127.0.0.1", receiver.port(), range);
        let task = tokio::spawn(receiver.run(Arc::new(EngineSink(target.clone()))));

        let sent = send_range(source, order).await.unwrap();
        assert_eq!(sent as usize, expected.len());
        assert_eq!(task.await.unwrap().unwrap(), sent);
        for key in keys {
            let moved = range.contains(RingHash::from_key(&key));
            assert_eq!(target.in_storage(&key), moved, "key {}", key);
        }
    }
}
