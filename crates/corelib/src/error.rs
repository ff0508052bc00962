//! Error types for the core library.

use crate::token::RingHash;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying the ring.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two nodes map to the same position on the ring.
    #[error("hash collision detected: {existing} and {incoming} both hash to {hash}")]
    HashCollision {
        hash: RingHash,
        existing: String,
        incoming: String,
    },

    /// The operation needs at least one node.
    #[error("hash ring is empty")]
    EmptyRing,

    /// No node sits at the given hash.
    #[error("no node with hash {0} in ring")]
    NodeNotFound(RingHash),

    /// The ring no longer satisfies its ordering invariants.
    #[error("mal-formed ring structure: {0}")]
    StructuralIntegrity(String),

    /// A textual hash could not be parsed.
    #[error("invalid hash value: {0}")]
    InvalidHash(String),

    /// Node descriptors could not be decoded.
    #[error("malformed node descriptor: {0}")]
    MalformedDescriptor(#[from] serde_json::Error),
}
