//! Ranges over the circular hash space.

use crate::token::{RingHash, Token};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A left-open, right-closed range `(lower, upper]` on the ring.
///
/// When `lower >= upper` the range wraps through the end of the hash space.
/// `lower == upper` therefore denotes the whole ring, which is exactly the
/// owned range of the only node in a single-node ring.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct HashRange {
    pub lower: RingHash,
    pub upper: RingHash,
}

impl HashRange {
    pub fn new(lower: RingHash, upper: RingHash) -> Self {
        Self { lower, upper }
    }

    /// The range covering every position.
    pub fn full_at(anchor: RingHash) -> Self {
        Self::new(anchor, anchor)
    }

    /// True if the range passes through the max-to-zero boundary.
    pub fn is_wrapping(&self) -> bool {
        self.lower >= self.upper
    }

    pub fn is_full(&self) -> bool {
        self.lower == self.upper
    }

    /// Membership test for `(lower, upper]`.
    pub fn contains(&self, hash: RingHash) -> bool {
        if self.lower < self.upper {
            self.lower < hash && hash <= self.upper
        } else {
            hash <= self.upper || hash > self.lower
        }
    }

    /// Number of positions in the range, modulo 2^128 (a full range reports 0).
    pub fn span(&self) -> u128 {
        self.lower.distance_to(&self.upper).0
    }
}

impl fmt::Display for HashRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.lower, self.upper)
    }
}
