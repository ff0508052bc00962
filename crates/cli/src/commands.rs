//! Subcommands.

use anyhow::Context;
use clap::{Args, Subcommand};
use corelib::{HashRing, RingHash, RingNode};
use node::{
    InMemoryCoordination, KvServer, NodeConfig, NodeCoordinator, NodeMetadata, NodeState,
};
use std::path::PathBuf;
use std::sync::Arc;
use storage::CacheStrategy;
use tracing::info;

pub type CommandResult = anyhow::Result<()>;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a standalone node.
    Serve(ServeArgs),
    /// Print ownership and replica sets of a descriptor file.
    Ring(RingArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Client port.
    #[arg(long)]
    pub port: u16,

    /// Unique node name.
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long = "cache-size", default_value_t = 100)]
    pub cache_size: usize,

    /// One of None, LRU, LFU, FIFO.
    #[arg(long, default_value = "FIFO")]
    pub strategy: String,

    /// Store directory, `data/<name>` by default.
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Node descriptor JSON to join as the initial ring.
    #[arg(long)]
    pub ring: Option<PathBuf>,
}

impl ServeArgs {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data").join(&self.name))
    }
}

#[derive(Debug, Args)]
pub struct RingArgs {
    /// Node descriptor JSON: `[{"name", "host", "port"}, ...]`.
    pub descriptors: PathBuf,

    /// Also show where this key lives.
    #[arg(long)]
    pub key: Option<String>,
}

impl Command {
    pub async fn execute(self) -> CommandResult {
        match self {
            Command::Serve(args) => serve(args).await,
            Command::Ring(args) => {
                print!("{}", describe_ring(&args)?);
                Ok(())
            }
        }
    }
}

/// Maps a strategy name to a cache strategy with the usage message operators
/// expect on failure.
pub fn parse_strategy(name: &str) -> anyhow::Result<CacheStrategy> {
    name.parse()
        .map_err(|_| anyhow::anyhow!("Must be one of [None LRU LFU FIFO]"))
}

async fn serve(args: ServeArgs) -> CommandResult {
    let strategy = parse_strategy(&args.strategy)?;
    let config = NodeConfig {
        name: args.name.clone(),
        host: args.host.clone(),
        port: args.port,
        data_dir: args.data_dir(),
        metadata: NodeMetadata::new(args.cache_size, strategy),
    };
    let state = Arc::new(NodeState::open(&config).context("failed to open node state")?);

    let zk = Arc::new(InMemoryCoordination::new());
    let node_path = config.node_path();
    zk.create(&node_path, config.metadata.to_json()?);
    let events = zk.watch(&node_path);
    let coordinator = NodeCoordinator::new(state.clone(), zk.clone(), node_path.clone());

    let server = KvServer::bind(state.clone(), (config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    let shutdown = server.shutdown_handle();
    let server_task = tokio::spawn(server.run());
    let coordinator_task = tokio::spawn(coordinator.run(events));

    if let Some(path) = &args.ring {
        let descriptors = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        zk.publish_ring(&node_path, descriptors);
    }
    zk.create(&format!("{}/Start", node_path), Vec::new());

    tokio::signal::ctrl_c().await?;
    info!("received interrupt, shutting down");
    shutdown.close();
    server_task.await??;
    coordinator_task.abort();
    Ok(())
}

fn describe_ring(args: &RingArgs) -> anyhow::Result<String> {
    let data = std::fs::read(&args.descriptors)
        .with_context(|| format!("failed to read {}", args.descriptors.display()))?;
    let ring = HashRing::from_json(&data)?;
    render(&ring, args.key.as_deref())
}

fn names(nodes: &[&RingNode]) -> String {
    nodes.iter().map(|n| n.name()).collect::<Vec<_>>().join(", ")
}

fn render(ring: &HashRing, key: Option<&str>) -> anyhow::Result<String> {
    let mut out = format!("{} nodes\n", ring.len());
    for node in ring.nodes() {
        out.push_str(&format!(
            "{:<12} {}:{:<5} owns {} replicas [{}]\n",
            node.name(),
            node.host(),
            node.port(),
            ring.owned_range(node.hash())?,
            names(&ring.replica_targets(node)),
        ));
    }
    if let Some(key) = key {
        match ring.owner_of_key(key) {
            Some(owner) => out.push_str(&format!(
                "key {:?} hash {} -> {} replicas [{}]\n",
                key,
                RingHash::from_key(key),
                owner.name(),
                names(&ring.replica_targets(owner)),
            )),
            None => out.push_str(&format!("key {:?} has no owner\n", key)),
        }
    }
    Ok(out)
}
