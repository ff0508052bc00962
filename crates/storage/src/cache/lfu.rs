//! Least-frequently-used cache.

use crate::cache::{CacheStore, CacheStrategy};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Eviction rank: access count first, then insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    hits: u64,
    inserted: u64,
}

/// Evicts the entry with the fewest accesses; the earliest inserted entry
/// loses ties.
///
/// Inserting a key counts as its first access, as does every later `get` or
/// `put` of that key.
#[derive(Debug)]
pub struct LfuCache {
    capacity: usize,
    sequence: u64,
    entries: HashMap<String, String>,
    ranks: PriorityQueue<String, Reverse<Rank>>,
}

impl LfuCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            sequence: 0,
            entries: HashMap::with_capacity(capacity),
            ranks: PriorityQueue::with_capacity(capacity),
        }
    }

    /// Access count of a resident key.
    pub fn hits(&self, key: &str) -> Option<u64> {
        self.ranks.get_priority(key).map(|Reverse(rank)| rank.hits)
    }

    fn touch(&mut self, key: &str) {
        if let Some(Reverse(rank)) = self.ranks.get_priority(key).copied() {
            let bumped = Rank {
                hits: rank.hits + 1,
                ..rank
            };
            self.ranks.change_priority(key, Reverse(bumped));
        }
    }
}

impl CacheStore for LfuCache {
    fn get(&mut self, key: &str) -> Option<String> {
        let value = self.entries.get(key).cloned()?;
        self.touch(key);
        Some(value)
    }

    fn put(&mut self, key: &str, value: String) -> Option<String> {
        if let Some(slot) = self.entries.get_mut(key) {
            *slot = value;
            self.touch(key);
            return None;
        }
        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            if let Some((victim, _)) = self.ranks.pop() {
                self.entries.remove(&victim);
                evicted = Some(victim);
            }
        }
        self.sequence += 1;
        let rank = Rank {
            hits: 1,
            inserted: self.sequence,
        };
        self.ranks.push(key.to_string(), Reverse(rank));
        self.entries.insert(key.to_string(), value);
        evicted
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.ranks.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn strategy(&self) -> CacheStrategy {
        CacheStrategy::Lfu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_frequent() {
        let mut cache = LfuCache::new(2);
        cache.put("a", "1".into());
        cache.put("b", "2".into());
        cache.get("a");
        cache.get("a");
        assert_eq!(cache.hits("a"), Some(3));

        assert_eq!(cache.put("c", "3".into()), Some("b".to_string()));
        assert!(cache.contains_key("a"));
        assert!(cache.contains_key("c"));
    }

    #[test]
    fn test_ties_evict_earliest_insertion() {
        let mut cache = LfuCache::new(3);
        cache.put("a", "1".into());
        cache.put("b", "2".into());
        cache.put("c", "3".into());
        cache.get("a");

        // b and c both have one hit; b was inserted first
        assert_eq!(cache.put("d", "4".into()), Some("b".to_string()));
    }

    #[test]
    fn test_new_entry_starts_over() {
        let mut cache = LfuCache::new(1);
        cache.put("a", "1".into());
        cache.get("a");
        assert_eq!(cache.put("b", "2".into()), Some("a".to_string()));
        assert_eq!(cache.hits("b"), Some(1));
        assert_eq!(cache.hits("a"), None);
    }
}
