//! Durable key/value backing store.
//!
//! The store is the system of record behind the cache. It must survive
//! process restarts and tolerate interleaved raw access from several callers;
//! sled provides both.

use crate::error::{Result, StorageError};
use std::path::Path;
use tracing::{debug, info};

/// Durable key/value map.
///
/// Size limits are not checked here: the engine validates keys and values
/// before they reach the store.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Creates or overwrites `key`. Returns `true` if a previous value was
    /// replaced.
    fn put(&self, key: &str, value: &str) -> Result<bool>;

    fn in_storage(&self, key: &str) -> Result<bool>;

    /// Removes every persisted pair.
    fn clear_storage(&self) -> Result<()>;

    /// Snapshot of every persisted pair.
    fn entries(&self) -> Result<Vec<(String, String)>>;
}

/// sled-backed store. Each node keeps its pairs in one named tree.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

const KV_TREE: &str = "kv";

impl SledStore {
    /// Opens (or creates) the store under `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening persistent store");
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store that is discarded on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(KV_TREE)?;
        Ok(Self { db, tree })
    }

    /// Flushes dirty pages to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| StorageError::Corrupted(key.to_string()))
}

impl PersistentStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<bool> {
        let previous = self.tree.insert(key.as_bytes(), value.as_bytes())?;
        self.tree.flush()?;
        Ok(previous.is_some())
    }

    fn in_storage(&self, key: &str) -> Result<bool> {
        Ok(self.tree.contains_key(key.as_bytes())?)
    }

    fn clear_storage(&self) -> Result<()> {
        debug!("clearing persistent store");
        self.tree.clear()?;
        self.tree.flush()?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut results = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|_| StorageError::Corrupted(String::from_utf8_lossy(&key).into_owned()))?;
            let value = decode(&key, &value)?;
            results.push((key, value));
        }
        Ok(results)
    }
}
