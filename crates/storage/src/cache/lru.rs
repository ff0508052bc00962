//! Least-recently-used cache.

use crate::cache::{CacheStore, CacheStrategy};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Evicts the entry whose last `get` or `put` is oldest.
///
/// Every access stamps the key with a monotonically increasing tick; the
/// queue pops the smallest tick first.
#[derive(Debug)]
pub struct LruCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, String>,
    recency: PriorityQueue<String, Reverse<u64>>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
            recency: PriorityQueue::with_capacity(capacity),
        }
    }

    fn touch(&mut self, key: &str) {
        self.tick += 1;
        self.recency.change_priority(key, Reverse(self.tick));
    }
}

impl CacheStore for LruCache {
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
            if let Some((lru, _)) = self.recency.pop() {
                self.entries.remove(&lru);
                evicted = Some(lru);
            }
        }
        self.tick += 1;
        self.recency.push(key.to_string(), Reverse(self.tick));
        self.entries.insert(key.to_string(), value);
        evicted
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn strategy(&self) -> CacheStrategy {
        CacheStrategy::Lru
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.put("a", "1".into());
        cache.put("b", "2".into());
        assert_eq!(cache.get("a"), Some("1".to_string()));

        assert_eq!(cache.put("c", "3".into()), Some("b".to_string()));
        assert!(cache.contains_key("a"));
        assert!(cache.contains_key("c"));
    }

    #[test]
    fn test_put_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.put("a", "1".into());
        cache.put("b", "2".into());
        cache.put("a", "11".into());

        assert_eq!(cache.put("c", "3".into()), Some("b".to_string()));
        assert_eq!(cache.get("a"), Some("11".to_string()));
    }

    #[test]
    fn test_contains_key_is_not_an_access() {
        let mut cache = LruCache::new(2);
        cache.put("a", "1".into());
        cache.put("b", "2".into());
        assert!(cache.contains_key("a"));
        assert_eq!(cache.put("c", "3".into()), Some("a".to_string()));
    }

    #[test]
    fn test_miss_does_not_insert() {
        let mut cache = LruCache::new(2);
        assert_eq!(cache.get("missing"), None);
        assert!(cache.is_empty());
    }
}
