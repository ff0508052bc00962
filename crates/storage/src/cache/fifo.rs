//! First-in first-out cache.

use crate::cache::{CacheStore, CacheStrategy};
use std::collections::{HashMap, VecDeque};

/// Evicts the resident entry that was inserted first.
///
/// Updating a resident key replaces its value but keeps its place in the
/// insertion order.
#[derive(Debug)]
pub struct FifoCache {
    capacity: usize,
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl FifoCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }
}

impl CacheStore for FifoCache {
    fn get(&mut self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) -> Option<String> {
        if let Some(slot) = self.entries.get_mut(key) {
            *slot = value;
            return None;
        }
        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        self.order.push_back(key.to_string());
        self.entries.insert(key.to_string(), value);
        evicted
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn strategy(&self) -> CacheStrategy {
        CacheStrategy::Fifo
    }
}
