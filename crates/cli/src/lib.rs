//! Command line front end for a storage node.
//!
//! Provides commands for:
//! - Running a standalone node
//! - Inspecting a ring built from a node descriptor file

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult, RingArgs, ServeArgs};
pub use config::CliConfig;
