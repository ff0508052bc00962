//! Node configuration.
//!
//! Cache settings live in the coordination service under the node's path as
//! JSON, e.g. `{"cacheSize": 100, "cacheStrategy": "LRU"}`. Everything else
//! comes from the command line.

use crate::coordination::{CoordinationClient, CoordinationError};
use crate::error::{NodeError, Result};
use corelib::RingNode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use storage::CacheStrategy;

/// Coordination path under which every node registers.
pub const SERVER_ROOT: &str = "/kvservers";

/// Per-node cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub cache_size: usize,
    pub cache_strategy: String,
}

impl NodeMetadata {
    pub fn new(cache_size: usize, strategy: CacheStrategy) -> Self {
        Self {
            cache_size,
            cache_strategy: strategy.name().to_string(),
        }
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Reads the metadata stored at `node_path`.
    pub async fn fetch(client: &dyn CoordinationClient, node_path: &str) -> Result<Self> {
        let data = client
            .get_data(node_path)
            .await?
            .ok_or_else(|| CoordinationError::NoNode(node_path.to_string()))?;
        Self::from_json(&data)
    }

    /// Resolves the configured strategy name.
    pub fn strategy(&self) -> Result<CacheStrategy> {
        self.cache_strategy
            .parse()
            .map_err(|e: storage::StorageError| NodeError::Configuration(e.to_string()))
    }
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self::new(100, CacheStrategy::Fifo)
    }
}

/// Everything a node needs to boot.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metadata: NodeMetadata,
}

impl NodeConfig {
    /// This node's ring identity.
    pub fn self_node(&self) -> RingNode {
        RingNode::new(self.name.clone(), self.host.clone(), self.port)
    }

    /// Coordination path holding this node's metadata and commands.
    pub fn node_path(&self) -> String {
        format!("{}/{}", SERVER_ROOT, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::InMemoryCoordination;

    #[test]
    fn test_metadata_json() {
        let meta = NodeMetadata::from_json(br#"{"cacheSize": 64, "cacheStrategy": "LRU"}"#).unwrap();
        assert_eq!(meta.cache_size, 64);
        assert_eq!(meta.strategy().unwrap(), CacheStrategy::Lru);

        let again = NodeMetadata::from_json(&meta.to_json().unwrap()).unwrap();
        assert_eq!(again, meta);
    }

    #[test]
    fn test_unknown_strategy() {
        let meta = NodeMetadata {
            cache_size: 10,
            cache_strategy: "MRU".into(),
        };
        assert!(matches!(meta.strategy(), Err(NodeError::Configuration(_))));
    }

    #[test]
    fn test_malformed_metadata() {
        assert!(matches!(
            NodeMetadata::from_json(b"{cacheSize"),
            Err(NodeError::Metadata(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_from_node_path() {
        let zk = InMemoryCoordination::new();
        zk.create("/kvservers/a", br#"{"cacheSize": 5, "cacheStrategy": "None"}"#.to_vec());

        let meta = NodeMetadata::fetch(&zk, "/kvservers/a").await.unwrap();
        assert_eq!(meta.strategy().unwrap(), CacheStrategy::None);
        assert!(NodeMetadata::fetch(&zk, "/kvservers/b").await.is_err());
    }

    #[test]
    fn test_node_path() {
        let config = NodeConfig {
            name: "server1".into(),
            host: "127.0.0.1".into(),
            port: 5000,
            data_dir: PathBuf::from("data"),
            metadata: NodeMetadata::default(),
        };
        assert_eq!(config.node_path(), "/kvservers/server1");
        assert_eq!(config.self_node().address(), "127.0.0.1:5000");
    }
}
