//! Top-level arguments and process setup.

use crate::commands::Command;
use anyhow::Context;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "kvnode", version, about = "Partitioned key-value store node")]
pub struct CliConfig {
    /// Log verbosity.
    #[arg(
        long = "log-level",
        global = true,
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Installs logging, then runs the command on a fresh runtime.
    pub fn run(self) -> anyhow::Result<()> {
        init_logging(&self.log_level)?;
        let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
        runtime.block_on(self.command.execute())
    }
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: tracing::Level = level
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid log level: {}", level))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
    Ok(())
}
