//! Write replication for ring nodes.
//!
//! This crate provides:
//! - Pluggable strategies deciding which nodes receive a node's writes
//! - Outbound replica links and the connectors that open them
//! - The forwarder manager that keeps links in step with ring topology

pub mod error;
pub mod link;
pub mod manager;
pub mod strategy;

pub use error::{ForwardError, ForwardFailure, ReplicationError, Result};
pub use link::{ReplicaConnector, ReplicaLink, TcpConnector, TcpReplicaLink};
pub use manager::{ReplicaForwarderManager, UpdateSummary, DEFAULT_LINK_TIMEOUT};
pub use strategy::{ReplicationStrategy, SimpleStrategy};
