//! Node abstractions for the consistent hash ring.
//!
//! A `RingNode` is the identity of one storage node: its logical name, the
//! address clients and peers connect to, and the ring position derived from
//! that address.

use crate::error::Result;
use crate::token::RingHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw `{name, host, port}` record as published by the coordination layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }
}

/// Decodes a JSON array of node descriptors.
pub fn decode_descriptors(data: &[u8]) -> Result<Vec<NodeDescriptor>> {
    Ok(serde_json::from_slice(data)?)
}

/// Logical node participating in the ring.
///
/// Keep this struct small and cheap to clone; connections and other heavy
/// state live with the replication manager.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RingNode {
    name: String,
    host: String,
    port: u16,
    hash: RingHash,
}

impl RingNode {
    /// Construct a node, deriving its position from `host:port`.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let hash = RingHash::from_address(&host, port);
        Self {
            name: name.into(),
            host,
            port,
            hash,
        }
    }

    /// Construct a node at an explicit position. Used when the position is
    /// dictated by the caller rather than derived from the address.
    pub fn with_hash(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        hash: RingHash,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            hash,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn hash(&self) -> RingHash {
        self.hash
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&NodeDescriptor> for RingNode {
    fn from(desc: &NodeDescriptor) -> Self {
        RingNode::new(desc.name.clone(), desc.host.clone(), desc.port)
    }
}

impl fmt::Display for RingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{}, {})", self.name, self.host, self.port, self.hash)
    }
}
