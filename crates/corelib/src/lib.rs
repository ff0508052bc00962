//! Core library for the partitioned key-value store.
//!
//! This crate provides the fundamental abstractions for placing nodes and keys
//! on a consistent-hashing ring:
//! - The 128-bit hash space and its token type
//! - Ring nodes and the descriptors they are decoded from
//! - Hash ranges with wrap-around arithmetic
//! - The hash ring itself: ownership, replica sets and range mapping

pub mod error;
pub mod node;
pub mod ring;
pub mod token;

pub use error::{Error, Result};
pub use node::{decode_descriptors, NodeDescriptor, RingNode};
pub use ring::{HashRange, HashRing, REPLICATION_NUM};
pub use token::{RingHash, Token};
