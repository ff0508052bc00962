//! 128-bit ring position derived with xxh3.

use crate::error::{Error, Result};
use crate::token::traits::Token;
use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

/// Position on the ring, a point in the circular `u128` hash space.
///
/// Node positions are derived from `"host:port"`, key positions from the key
/// bytes, so both live in the same space and can be compared directly.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct RingHash(pub u128);

impl Token for RingHash {
    fn zero() -> Self {
        RingHash(0)
    }

    fn max() -> Self {
        RingHash(u128::MAX)
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }

    fn is_max(&self) -> bool {
        self.0 == u128::MAX
    }

    fn distance_to(&self, other: &Self) -> Self {
        RingHash(other.0.wrapping_sub(self.0))
    }

    fn successor(&self) -> Self {
        RingHash(self.0.wrapping_add(1))
    }
}

impl RingHash {
    /// Hashes raw bytes into the ring space.
    pub fn from_bytes(data: &[u8]) -> Self {
        RingHash(xxh3_128(data))
    }

    /// Hashes a client key.
    pub fn from_key(key: &str) -> Self {
        Self::from_bytes(key.as_bytes())
    }

    /// Hashes a node address the way nodes are placed on the ring.
    pub fn from_address(host: &str, port: u16) -> Self {
        Self::from_key(&format!("{}:{}", host, port))
    }

    /// Parses the 32-digit hex form produced by `Display`.
    pub fn from_hex(s: &str) -> Result<Self> {
        u128::from_str_radix(s.trim(), 16)
            .map(RingHash)
            .map_err(|e| Error::InvalidHash(format!("{:?}: {}", s, e)))
    }
}

impl fmt::Display for RingHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<u128> for RingHash {
    fn from(value: u128) -> Self {
        RingHash(value)
    }
}
