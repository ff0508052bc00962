//! Per-node storage engine.
//!
//! A node serves reads and writes through a fixed-capacity in-memory cache in
//! front of a persistent store:
//! - [`cache`]: the `CacheStore` contract and its FIFO, LRU and LFU strategies
//! - [`persistent`]: the durable `PersistentStore` contract, backed by sled
//! - [`engine`]: read-fill / write-through composition of the two
//! - [`validation`]: key and value size limits enforced at the engine boundary

pub mod cache;
pub mod engine;
pub mod error;
pub mod persistent;
pub mod validation;

pub use cache::{build_cache, CacheStore, CacheStrategy};
pub use engine::{StorageEngine, WriteOutcome};
pub use error::{Result, StorageError};
pub use persistent::{PersistentStore, SledStore};
pub use validation::{validate_key, validate_value, MAX_KEY_LEN, MAX_VALUE_LEN};
