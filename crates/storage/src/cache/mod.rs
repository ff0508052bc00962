//! Cache strategy abstractions.
//!
//! Every strategy implements the same [`CacheStore`] contract; which one a
//! node runs is chosen once at startup from its [`CacheStrategy`]:
//!
//! - **FIFO**: evicts the entry inserted earliest
//! - **LRU**: evicts the entry accessed least recently
//! - **LFU**: evicts the entry accessed least often (earliest insertion on ties)
//! - **None**: no cache at all; the engine reads and writes the store directly

pub mod fifo;
pub mod lfu;
pub mod lru;

pub use fifo::FifoCache;
pub use lfu::LfuCache;
pub use lru::LruCache;

use crate::error::{Result, StorageError};
use std::fmt;
use std::str::FromStr;

/// Fixed-capacity key/value cache.
///
/// Once `len() == capacity()`, inserting a new key evicts exactly one entry
/// before the insert. Updating a resident key never evicts.
///
/// # Thread Safety
///
/// Implementations are not internally synchronised; the storage engine
/// serialises access to them.
pub trait CacheStore: Send {
    /// Returns the cached value, counting as an access for LRU/LFU.
    fn get(&mut self, key: &str) -> Option<String>;

    /// Inserts or updates `key`, returning the key evicted to make room.
    fn put(&mut self, key: &str, value: String) -> Option<String>;

    /// Presence check that does not count as an access.
    fn contains_key(&self, key: &str) -> bool;

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    fn strategy(&self) -> CacheStrategy;
}

/// Eviction policy selected from node configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStrategy {
    Fifo,
    Lru,
    Lfu,
    None,
}

impl CacheStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            CacheStrategy::Fifo => "FIFO",
            CacheStrategy::Lru => "LRU",
            CacheStrategy::Lfu => "LFU",
            CacheStrategy::None => "None",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CacheStrategy {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(CacheStrategy::Fifo),
            "LRU" => Ok(CacheStrategy::Lru),
            "LFU" => Ok(CacheStrategy::Lfu),
            "NONE" => Ok(CacheStrategy::None),
            _ => Err(StorageError::Configuration(format!(
                "unknown cache strategy {:?}, must be one of [None LRU LFU FIFO]",
                s
            ))),
        }
    }
}

/// Constructs the cache for `strategy`, or `None` when caching is disabled.
///
/// # Errors
///
/// [`StorageError::Configuration`] for a zero capacity with an enabled
/// strategy.
pub fn build_cache(strategy: CacheStrategy, capacity: usize) -> Result<Option<Box<dyn CacheStore>>> {
    if strategy != CacheStrategy::None && capacity == 0 {
        return Err(StorageError::Configuration(format!(
            "{} cache needs a capacity of at least 1",
            strategy
        )));
    }
    Ok(match strategy {
        CacheStrategy::Fifo => Some(Box::new(FifoCache::new(capacity))),
        CacheStrategy::Lru => Some(Box::new(LruCache::new(capacity))),
        CacheStrategy::Lfu => Some(Box::new(LfuCache::new(capacity))),
        CacheStrategy::None => None,
    })
}
