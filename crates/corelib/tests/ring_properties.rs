//! Property tests for ring partitioning.
//!
//! After any sequence of additions and removals the owned ranges must be
//! pairwise disjoint and together cover the hash space exactly once.

use corelib::{HashRange, HashRing, RingHash, RingNode, REPLICATION_NUM};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum Op {
    Add(u128),
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u128>().prop_map(Op::Add),
        1 => any::<usize>().prop_map(Op::Remove),
    ]
}

fn apply(ring: &mut HashRing, op: &Op) {
    match op {
        Op::Add(h) => {
            let node = RingNode::with_hash(format!("n{:x}", h), "127.0.0.1", 0, RingHash(*h));
            let existed = ring.node_at(RingHash(*h)).is_some();
            assert_eq!(ring.add_node(node).is_err(), existed);
        }
        Op::Remove(i) => {
            if ring.is_empty() {
                assert!(ring.remove_node(RingHash(0)).is_err());
            } else {
                let hash = ring.nodes()[i % ring.len()].hash();
                ring.remove_node(hash).unwrap();
            }
        }
    }
}

fn owned_ranges(ring: &HashRing) -> Vec<HashRange> {
    ring.nodes()
        .iter()
        .map(|n| ring.owned_range(n.hash()).unwrap())
        .collect()
}

proptest! {
    #[test]
    fn ranges_partition_the_ring(ops in prop::collection::vec(op(), 1..40), samples in prop::collection::vec(any::<u128>(), 16)) {
        let mut ring = HashRing::new();
        for op in &ops {
            apply(&mut ring, op);
            prop_assert!(ring.check_integrity().is_ok());

            let ranges = owned_ranges(&ring);
            // Spans sum to 2^128, i.e. zero modulo the hash space.
            let total = ranges.iter().fold(0u128, |acc, r| acc.wrapping_add(r.span()));
            prop_assert_eq!(total, 0);

            for sample in &samples {
                let hash = RingHash(*sample);
                let holders: Vec<_> = ring
                    .nodes()
                    .iter()
                    .zip(&ranges)
                    .filter(|(_, r)| r.contains(hash))
                    .map(|(n, _)| n)
                    .collect();
                if ring.is_empty() {
                    prop_assert!(ring.find_owner(hash).is_none());
                } else {
                    prop_assert_eq!(holders.len(), 1);
                    prop_assert_eq!(ring.find_owner(hash), Some(holders[0]));
                }
            }
        }
    }

    #[test]
    fn replica_targets_are_distinct_successors(hashes in prop::collection::btree_set(any::<u128>(), 1..12)) {
        let ring = HashRing::from_nodes(
            hashes.iter().map(|h| RingNode::with_hash(format!("n{:x}", h), "127.0.0.1", 0, RingHash(*h))),
        ).unwrap();
        for node in ring.nodes() {
            let targets = ring.replica_targets(node);
            let unique: BTreeSet<_> = targets.iter().map(|t| t.hash()).collect();
            prop_assert!(targets.len() <= REPLICATION_NUM);
            prop_assert_eq!(targets.len(), REPLICATION_NUM.min(ring.len() - 1));
            prop_assert_eq!(unique.len(), targets.len());
            prop_assert!(!unique.contains(&node.hash()));
        }
    }

    #[test]
    fn range_ownership_covers_query(hashes in prop::collection::btree_set(any::<u128>(), 1..8), lower in any::<u128>(), upper in any::<u128>(), sample in any::<u128>()) {
        let ring = HashRing::from_nodes(
            hashes.iter().map(|h| RingNode::with_hash(format!("n{:x}", h), "127.0.0.1", 0, RingHash(*h))),
        ).unwrap();
        let query = HashRange::new(RingHash(lower), RingHash(upper));
        let pieces = ring.range_ownership(query).unwrap();
        prop_assert!(!pieces.is_empty());

        let hash = RingHash(sample);
        let covering: Vec<_> = pieces.iter().filter(|(_, r)| r.contains(hash)).collect();
        if query.contains(hash) {
            prop_assert_eq!(covering.len(), 1);
            prop_assert_eq!(Some(covering[0].0), ring.find_owner(hash));
        } else {
            prop_assert!(covering.is_empty());
        }
    }
}
