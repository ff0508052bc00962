//! Wire protocol for node traffic.
//!
//! This crate provides the messages and codecs for:
//! - Client requests and replica forwarding on a node's service port
//! - Data migration between nodes during rebalancing

pub mod codec;
pub mod error;
pub mod protocol;
pub mod receiver;
pub mod sender;

pub use codec::{read_frame, write_frame, MAX_FRAME_LEN};
pub use error::{Result, StreamingError};
pub use protocol::{Request, Response, Transfer, TransferAck};
pub use receiver::{EntrySink, MigrationReceiver, DEFAULT_ACCEPT_TIMEOUT};
pub use sender::MigrationSender;
