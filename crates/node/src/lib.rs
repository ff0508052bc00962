//! A storage node of the partitioned key-value store.
//!
//! This crate ties the other layers together:
//! - Node status and the shared state every connection task sees
//! - The client accept loop and per-connection request handling
//! - The coordination seam and the state machine driven by it
//! - Range migration between nodes

pub mod config;
pub mod connection;
pub mod coordination;
pub mod coordinator;
pub mod error;
pub mod migration;
pub mod server;
pub mod state;
pub mod status;

pub use config::{NodeConfig, NodeMetadata, SERVER_ROOT};
pub use coordination::{
    CoordinationClient, CoordinationError, CoordinationEvent, InMemoryCoordination,
};
pub use coordinator::{Command, NodeCoordinator};
pub use error::{NodeError, Result};
pub use migration::{send_range, EngineSink, MigrationOrder};
pub use server::{KvServer, ShutdownHandle};
pub use state::NodeState;
pub use status::NodeStatus;
