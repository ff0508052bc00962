//! Simple replication strategy.
//!
//! Places replicas on the nodes immediately following the coordinator in
//! ascending hash order.
//!
//! # Algorithm
//!
//! 1. Start at the coordinator's hash
//! 2. Step to the owner of `hash + 1`, skipping nodes already chosen
//! 3. Stop after `replication_factor` hops or when the walk returns home
//!
//! A ring with fewer than `replication_factor + 1` nodes yields every other
//! node exactly once.

use crate::strategy::ReplicationStrategy;
use corelib::{HashRing, RingNode, REPLICATION_NUM};

/// Successor-based replication.
///
/// # Example
///
/// ```rust
/// use corelib::{HashRing, RingNode};
/// use replication::{ReplicationStrategy, SimpleStrategy};
///
/// let mut ring = HashRing::new();
/// let a = RingNode::new("a", "127.0.0.1", 7001);
/// ring.add_node(a.clone()).unwrap();
/// ring.add_node(RingNode::new("b", "127.0.0.1", 7002)).unwrap();
///
/// let targets = SimpleStrategy::default().replica_targets(&ring, &a);
/// assert_eq!(targets.len(), 1);
/// assert_eq!(targets[0].name(), "b");
/// ```
#[derive(Debug, Clone)]
pub struct SimpleStrategy {
    replication_factor: usize,
}

impl SimpleStrategy {
    pub fn new(replication_factor: usize) -> Self {
        Self { replication_factor }
    }
}

impl Default for SimpleStrategy {
    fn default() -> Self {
        Self::new(REPLICATION_NUM)
    }
}

impl ReplicationStrategy for SimpleStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn replica_targets<'a>(&self, ring: &'a HashRing, node: &RingNode) -> Vec<&'a RingNode> {
        ring.successors(node.hash(), self.replication_factor)
    }

    fn name(&self) -> &'static str {
        "SimpleStrategy"
    }
}
