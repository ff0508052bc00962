//! Storage engine: cache in front of the persistent store.
//!
//! # Read path (read-fill)
//!
//! 1. Cache hit: return it, no store access
//! 2. Cache miss: read the store; a found value is put into the cache first
//!
//! # Write path (write-through)
//!
//! 1. Persist to the store (system of record)
//! 2. Only if that succeeded, update the cache
//!
//! # Concurrency
//!
//! One mutex covers the whole cache + store interaction of a call, so no
//! reader can observe a value between the persist and the cache update. This
//! is coarse on purpose; splitting it per key would break the read-fill /
//! write-through ordering.

use crate::cache::{build_cache, CacheStore, CacheStrategy};
use crate::error::Result;
use crate::persistent::{PersistentStore, SledStore};
use crate::validation::{validate_key, validate_value};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a write created a key or replaced an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
}

pub struct StorageEngine {
    strategy: CacheStrategy,
    cache: Mutex<Option<Box<dyn CacheStore>>>,
    store: Arc<dyn PersistentStore>,
}

impl StorageEngine {
    /// Builds an engine over an existing store.
    pub fn new(store: Arc<dyn PersistentStore>, strategy: CacheStrategy, capacity: usize) -> Result<Self> {
        let cache = build_cache(strategy, capacity)?;
        debug!(%strategy, capacity, "storage engine created");
        Ok(Self {
            strategy,
            cache: Mutex::new(cache),
            store,
        })
    }

    /// Opens a sled store under `path` and builds an engine over it.
    pub fn open(path: impl AsRef<Path>, strategy: CacheStrategy, capacity: usize) -> Result<Self> {
        let store = SledStore::open(path)?;
        Self::new(Arc::new(store), strategy, capacity)
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// Direct handle on the backing store.
    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    /// Reads `key`, filling the cache on a store hit.
    ///
    /// `Ok(None)` means the key is absent from both cache and store.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let mut cache = self.cache.lock();
        if let Some(cache) = cache.as_mut() {
            if let Some(value) = cache.get(key) {
                metrics::counter!("storage_cache_hits_total").increment(1);
                return Ok(Some(value));
            }
            metrics::counter!("storage_cache_misses_total").increment(1);
        }
        let value = self.store.get(key)?;
        if let (Some(cache), Some(value)) = (cache.as_mut(), value.as_ref()) {
            if let Some(evicted) = cache.put(key, value.clone()) {
                debug!(key, evicted = %evicted, "cache eviction on read-fill");
            }
        }
        Ok(value)
    }

    /// Persists `key`, then writes it through to the cache.
    pub fn write(&self, key: &str, value: &str) -> Result<WriteOutcome> {
        validate_key(key)?;
        validate_value(value)?;
        let mut cache = self.cache.lock();
        let replaced = self.store.put(key, value)?;
        if let Some(cache) = cache.as_mut() {
            if let Some(evicted) = cache.put(key, value.to_string()) {
                debug!(key, evicted = %evicted, "cache eviction on write");
            }
        }
        Ok(if replaced {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Inserted
        })
    }

    /// Cache-only presence check; always `false` with caching disabled.
    pub fn in_cache(&self, key: &str) -> bool {
        self.cache
            .lock()
            .as_ref()
            .map_or(false, |cache| cache.contains_key(key))
    }

    /// Store presence check. A failure to query counts as "not present".
    pub fn in_storage(&self, key: &str) -> bool {
        match self.store.in_storage(key) {
            Ok(found) => found,
            Err(e) => {
                warn!(key, error = %e, "unable to query persistent store, treating key as absent");
                false
            }
        }
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = self.cache.lock().as_mut() {
            cache.clear();
        }
    }

    /// Clears cache and persisted data.
    pub fn clear_all(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        self.store.clear_storage()?;
        if let Some(cache) = cache.as_mut() {
            cache.clear();
        }
        Ok(())
    }

    /// Every persisted pair; cache contents are always a subset.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let _guard = self.cache.lock();
        self.store.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    fn engine(strategy: CacheStrategy, capacity: usize) -> StorageEngine {
        let store = SledStore::temporary().unwrap();
        StorageEngine::new(Arc::new(store), strategy, capacity).unwrap()
    }

    #[test]
    fn test_round_trip_every_strategy() {
        for strategy in [CacheStrategy::Fifo, CacheStrategy::Lru, CacheStrategy::Lfu, CacheStrategy::None] {
            let engine = engine(strategy, 4);
            assert_eq!(engine.write("key", "value").unwrap(), WriteOutcome::Inserted);
            assert_eq!(engine.read("key").unwrap(), Some("value".to_string()));
            assert_eq!(engine.write("key", "other").unwrap(), WriteOutcome::Updated);
            assert_eq!(engine.read("key").unwrap(), Some("other".to_string()));
            assert_eq!(engine.read("missing").unwrap(), None);
        }
    }

    #[test]
    fn test_read_fills_cold_cache() {
        let engine = engine(CacheStrategy::Lru, 4);
        engine.store().put("cold", "from-disk").unwrap();
        assert!(!engine.in_cache("cold"));

        assert_eq!(engine.read("cold").unwrap(), Some("from-disk".to_string()));
        assert!(engine.in_cache("cold"));
    }

    #[test]
    fn test_write_through_populates_cache() {
        let engine = engine(CacheStrategy::Fifo, 4);
        engine.write("k", "v").unwrap();
        assert!(engine.in_cache("k"));
        assert!(engine.in_storage("k"));
    }

    #[test]
    fn test_disabled_cache_never_fills() {
        let engine = engine(CacheStrategy::None, 0);
        engine.write("k", "v").unwrap();
        engine.read("k").unwrap();
        assert!(!engine.in_cache("k"));
        assert!(engine.in_storage("k"));
    }

    #[test]
    fn test_validation_rejects_before_store() {
        let engine = engine(CacheStrategy::Fifo, 4);
        let err = engine.write("this-key-is-far-too-long", "v").unwrap_err();
        assert!(matches!(err, StorageError::KeyTooLong { .. }));
        assert!(engine.entries().unwrap().is_empty());

        let big = "x".repeat(crate::validation::MAX_VALUE_LEN + 1);
        assert!(engine.write("k", &big).unwrap_err().is_validation());
        assert!(!engine.in_storage("k"));
        assert!(!engine.in_cache("k"));
    }

    #[test]
    fn test_clear_cache_keeps_disk() {
        let engine = engine(CacheStrategy::Lfu, 4);
        engine.write("k", "v").unwrap();
        engine.clear_cache();
        assert!(!engine.in_cache("k"));
        assert_eq!(engine.read("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_clear_all() {
        let engine = engine(CacheStrategy::Lfu, 4);
        engine.write("k", "v").unwrap();
        engine.clear_all().unwrap();
        assert!(!engine.in_cache("k"));
        assert_eq!(engine.read("k").unwrap(), None);
    }
}
