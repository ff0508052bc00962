//! Consistent hash ring implementation.
//!
//! The ring keeps its nodes sorted by hash and answers ownership, replica and
//! range queries over the circular hash space.

pub mod range;
pub mod ring;

pub use range::HashRange;
pub use ring::{HashRing, REPLICATION_NUM};
