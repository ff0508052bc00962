//! Hash ring data structure.
//!
//! # Direction convention
//!
//! Nodes are kept in a vector sorted by ascending hash. For the node at index
//! `i`:
//!
//! - its **predecessor** is `nodes[i - 1]` (wrapping to the last node),
//! - its **successor** is `nodes[i + 1]` (wrapping to the first node),
//! - its **owned range** is `(predecessor.hash, node.hash]`.
//!
//! Every query below (ownership, replica targets, responsible ranges, range
//! mapping) is derived from this single ordering, so predecessor and successor
//! can never disagree.
//!
//! # Structural integrity
//!
//! The vector is only mutated through [`HashRing::add_node`] and
//! [`HashRing::remove_node`], both of which re-check the invariants (strictly
//! ascending hashes, no duplicates) and report a
//! [`Error::StructuralIntegrity`] instead of continuing on a broken ring.

use crate::error::{Error, Result};
use crate::node::{decode_descriptors, NodeDescriptor, RingNode};
use crate::ring::range::HashRange;
use crate::token::{RingHash, Token};
use std::fmt;
use tracing::debug;

/// Number of replicas kept in addition to the coordinator's own copy.
///
/// The replicas are the nodes immediately following the coordinator in
/// ascending hash order.
pub const REPLICATION_NUM: usize = 2;

/// Consistent hash ring over [`RingNode`]s.
///
/// # Performance
///
/// - **Lookup** (`find_owner`, `next_node`): O(log n) binary search
/// - **Mutation** (`add_node`, `remove_node`): O(n) (vector shift + integrity check)
/// - **Memory**: O(n)
///
/// # Example
///
/// ```rust
/// use corelib::{HashRing, RingNode, RingHash};
///
/// let mut ring = HashRing::new();
/// ring.add_node(RingNode::new("server1", "127.0.0.1", 50000)).unwrap();
/// ring.add_node(RingNode::new("server2", "127.0.0.1", 50001)).unwrap();
///
/// let owner = ring.find_owner(RingHash::from_key("some-key")).unwrap();
/// assert!(owner.name() == "server1" || owner.name() == "server2");
/// ```
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    nodes: Vec<RingNode>,
}

impl HashRing {
    /// Creates an empty ring.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Builds a ring from nodes, failing on the first hash collision.
    pub fn from_nodes(nodes: impl IntoIterator<Item = RingNode>) -> Result<Self> {
        let mut ring = Self::new();
        for node in nodes {
            ring.add_node(node)?;
        }
        Ok(ring)
    }

    pub fn from_descriptors(descriptors: &[NodeDescriptor]) -> Result<Self> {
        Self::from_nodes(descriptors.iter().map(RingNode::from))
    }

    /// Builds a ring from the JSON descriptor list published by the
    /// coordination layer.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Self::from_descriptors(&decode_descriptors(data)?)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in ascending hash order.
    pub fn nodes(&self) -> &[RingNode] {
        &self.nodes
    }

    pub fn node_by_name(&self, name: &str) -> Option<&RingNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Returns the node sitting exactly at `hash`, if any.
    pub fn node_at(&self, hash: RingHash) -> Option<&RingNode> {
        self.position(hash).map(|i| &self.nodes[i])
    }

    /// Inserts a node in hash order.
    ///
    /// # Errors
    ///
    /// [`Error::HashCollision`] if another node already occupies the same
    /// hash. The ring is left unchanged in that case.
    pub fn add_node(&mut self, node: RingNode) -> Result<()> {
        debug!(node = %node, "adding node to ring");
        let idx = self.lower_bound(node.hash());
        if let Some(existing) = self.nodes.get(idx) {
            if existing.hash() == node.hash() {
                return Err(Error::HashCollision {
                    hash: node.hash(),
                    existing: existing.name().to_string(),
                    incoming: node.name().to_string(),
                });
            }
        }
        self.nodes.insert(idx, node);
        self.check_integrity()
    }

    /// Removes the node sitting at `hash` and returns it.
    ///
    /// The removed node's range is absorbed by its successor.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyRing`] if there is nothing to remove
    /// - [`Error::NodeNotFound`] if no node sits exactly at `hash`
    pub fn remove_node(&mut self, hash: RingHash) -> Result<RingNode> {
        debug!(%hash, "removing node from ring");
        if self.nodes.is_empty() {
            return Err(Error::EmptyRing);
        }
        let idx = self.position(hash).ok_or(Error::NodeNotFound(hash))?;
        let removed = self.nodes.remove(idx);
        self.check_integrity()?;
        Ok(removed)
    }

    /// Drops every node.
    pub fn remove_all(&mut self) {
        self.nodes.clear();
    }

    /// Returns the node whose owned range contains `hash`.
    ///
    /// # Algorithm
    ///
    /// The owner is the first node with `node.hash >= hash`; if there is none
    /// the range wraps and the first node of the ring owns it.
    ///
    /// Returns `None` only for an empty ring.
    pub fn find_owner(&self, hash: RingHash) -> Option<&RingNode> {
        self.owner_index(hash).map(|i| &self.nodes[i])
    }

    /// Owner of a client key.
    pub fn owner_of_key(&self, key: &str) -> Option<&RingNode> {
        self.find_owner(RingHash::from_key(key))
    }

    /// Ring-order successor of `hash`: the owner of `hash + 1`.
    ///
    /// For a node's own hash this is the next node in ascending order (or the
    /// node itself in a single-node ring).
    pub fn next_node(&self, hash: RingHash) -> Option<&RingNode> {
        self.find_owner(hash.successor())
    }

    /// The node preceding the node at `hash`.
    pub fn predecessor(&self, hash: RingHash) -> Option<&RingNode> {
        let idx = self.position(hash)?;
        Some(&self.nodes[self.step_back(idx, 1)])
    }

    /// The range `(predecessor.hash, node.hash]` owned by the node at `hash`.
    pub fn owned_range(&self, hash: RingHash) -> Result<HashRange> {
        let idx = self.position(hash).ok_or(Error::NodeNotFound(hash))?;
        let pred = &self.nodes[self.step_back(idx, 1)];
        Ok(HashRange::new(pred.hash(), hash))
    }

    /// Nodes that must receive a copy of the data coordinated by `node`.
    ///
    /// These are the (up to) [`REPLICATION_NUM`] nodes immediately following
    /// `node` in ascending hash order. `node` itself is never included, and
    /// each target appears at most once, so a ring with fewer than
    /// `REPLICATION_NUM + 1` nodes yields every other node exactly once.
    ///
    /// `node` does not have to be a ring member: the walk starts from its hash.
    pub fn replica_targets(&self, node: &RingNode) -> Vec<&RingNode> {
        self.successors(node.hash(), REPLICATION_NUM)
    }

    /// Distinct nodes reached by walking `hops` successors from `hash`,
    /// excluding any node sitting at `hash` itself.
    pub fn successors(&self, hash: RingHash, hops: usize) -> Vec<&RingNode> {
        let mut found: Vec<&RingNode> = Vec::with_capacity(hops);
        let mut current = hash;
        for _ in 0..hops {
            let next = match self.next_node(current) {
                Some(next) => next,
                None => break,
            };
            if next.hash() != hash && !found.iter().any(|n| n.hash() == next.hash()) {
                found.push(next);
            }
            current = next.hash();
        }
        found
    }

    /// Nodes whose data `node` holds replicas of: the (up to)
    /// [`REPLICATION_NUM`] nodes immediately preceding it, excluding itself.
    pub fn responsible_nodes(&self, node: &RingNode) -> Result<Vec<&RingNode>> {
        let idx = self
            .position(node.hash())
            .ok_or(Error::NodeNotFound(node.hash()))?;
        let steps = REPLICATION_NUM.min(self.nodes.len() - 1);
        Ok((1..=steps)
            .map(|k| &self.nodes[self.step_back(idx, k)])
            .collect())
    }

    /// Whole range of data stored by `node`: its own range plus the ranges of
    /// every node it replicates.
    ///
    /// With `REPLICATION_NUM + 1` nodes or fewer this is the full ring.
    pub fn responsible_range(&self, node: &RingNode) -> Result<HashRange> {
        let idx = self
            .position(node.hash())
            .ok_or(Error::NodeNotFound(node.hash()))?;
        let steps = REPLICATION_NUM.min(self.nodes.len() - 1);
        let lower = &self.nodes[self.step_back(idx, steps + 1)];
        Ok(HashRange::new(lower.hash(), node.hash()))
    }

    /// The last node of `coordinator`'s replica chain, or `None` when the ring
    /// is too small for the chain to reach [`REPLICATION_NUM`] distinct hops.
    pub fn last_replication(&self, coordinator: &RingNode) -> Option<&RingNode> {
        let mut current = coordinator.hash();
        let mut last = None;
        for _ in 0..REPLICATION_NUM {
            let next = self.next_node(current)?;
            if next.hash() == coordinator.hash() {
                return None;
            }
            current = next.hash();
            last = Some(next);
        }
        last
    }

    /// Splits `range` into the pieces owned by each ring node, in ring order.
    ///
    /// The range is half-open, `(lower, upper]`, like every owned range: the
    /// `lower` bound itself belongs to whichever node owns it, not to the
    /// query. Pass `lower == upper` for the whole ring.
    ///
    /// Used to decide which live nodes receive which part of a departing
    /// node's data.
    ///
    /// # Algorithm
    ///
    /// Start at the owner of `range.lower + 1` and walk successors. Each
    /// visited node contributes the intersection of its owned range with the
    /// query; the walk stops at the node whose piece contains `range.upper`.
    /// A query that wraps back into its starting node's range lists that node
    /// twice (once per piece).
    ///
    /// # Errors
    ///
    /// [`Error::StructuralIntegrity`] if the walk does not terminate within
    /// `len + 1` steps.
    pub fn range_ownership(&self, range: HashRange) -> Result<Vec<(&RingNode, HashRange)>> {
        let mut pieces = Vec::new();
        let start = match self.owner_index(range.lower.successor()) {
            Some(idx) => idx,
            None => return Ok(pieces),
        };
        let n = self.nodes.len();
        let mut piece_lower = range.lower;
        for k in 0..=n {
            let node = &self.nodes[(start + k) % n];
            let piece = HashRange::new(piece_lower, node.hash());
            if piece.contains(range.upper) {
                pieces.push((node, HashRange::new(piece_lower, range.upper)));
                return Ok(pieces);
            }
            pieces.push((node, piece));
            piece_lower = node.hash();
        }
        Err(Error::StructuralIntegrity(format!(
            "range {} not covered after {} steps",
            range,
            n + 1
        )))
    }

    /// Verifies that hashes are strictly ascending.
    pub fn check_integrity(&self) -> Result<()> {
        for pair in self.nodes.windows(2) {
            if pair[0].hash() >= pair[1].hash() {
                return Err(Error::StructuralIntegrity(format!(
                    "{} is not ordered before {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }

    /// Index of the first node with `node.hash >= hash`.
    fn lower_bound(&self, hash: RingHash) -> usize {
        self.nodes.partition_point(|n| n.hash() < hash)
    }

    fn owner_index(&self, hash: RingHash) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        let idx = self.lower_bound(hash);
        Some(if idx == self.nodes.len() { 0 } else { idx })
    }

    fn position(&self, hash: RingHash) -> Option<usize> {
        self.nodes.binary_search_by(|n| n.hash().cmp(&hash)).ok()
    }

    fn step_back(&self, idx: usize, k: usize) -> usize {
        let n = self.nodes.len();
        (idx + n - (k % n)) % n
    }
}

impl fmt::Display for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return write!(f, "HashRing{{}}");
        }
        writeln!(f, "HashRing{{")?;
        for node in &self.nodes {
            writeln!(f, "  {}", node)?;
        }
        write!(f, "}}")
    }
}
