//! Token abstraction for the hash space.
//!
//! Tokens represent positions on the hash ring and must be comparable,
//! hashable, and thread-safe.

pub mod ring_hash;
pub mod traits;

pub use ring_hash::RingHash;
pub use traits::Token;
