//! Replication strategy abstractions.
//!
//! A strategy decides how many copies of a node's writes exist and which
//! nodes hold them. The node that owns a key is never one of its own
//! replica targets.

pub mod simple;

pub use simple::SimpleStrategy;

use corelib::{HashRing, RingNode};

/// Trait for replication strategies.
///
/// Implementations must be thread-safe (Send + Sync) as they are shared by
/// every connection task on a node.
pub trait ReplicationStrategy: Send + Sync + 'static {
    /// Number of replica targets per node, excluding the node itself.
    fn replication_factor(&self) -> usize;

    /// Nodes that must receive a copy of `node`'s writes, in ring order.
    fn replica_targets<'a>(&self, ring: &'a HashRing, node: &RingNode) -> Vec<&'a RingNode>;

    /// Human-readable strategy name for logging.
    fn name(&self) -> &'static str;
}
