//! Message types.
//!
//! Every connection carries one kind of conversation:
//!
//! - **Service port**: [`Request`] from a client or an upstream replica,
//!   answered by exactly one [`Response`].
//! - **Migration port**: a stream of [`Transfer::Entry`] closed by
//!   [`Transfer::Done`], answered by one [`TransferAck`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Get { key: String },
    Put { key: String, value: String },
    /// Copy of a write committed by the coordinator of `key`.
    Replicate { key: String, value: String },
}

impl Request {
    pub fn key(&self) -> &str {
        match self {
            Request::Get { key } | Request::Put { key, .. } | Request::Replicate { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    GetSuccess { key: String, value: String },
    GetError { key: String, reason: String },
    /// The key did not exist before this write.
    PutSuccess { key: String },
    /// The write replaced an existing value.
    PutUpdate { key: String },
    PutError { key: String, reason: String },
    ReplicateAck { key: String },
    ServerStopped,
    ServerWriteLock,
    NotResponsible { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transfer {
    Entry { key: String, value: String },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAck {
    pub received: u64,
}
