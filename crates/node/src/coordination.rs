//! The coordination seam.
//!
//! A node only needs four primitives from the coordination service: list the
//! pending commands under its path, read and write the data at a path, and
//! delete a path to acknowledge a command. Notifications arrive as
//! [`CoordinationEvent`]s on a channel the node drains one at a time.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

pub type Result<T> = std::result::Result<T, CoordinationError>;

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("no node at {0}")]
    NoNode(String),

    #[error("conflicting commands in one notification: {0:?}")]
    ConflictingCommands(Vec<String>),

    #[error("coordination service unavailable: {0}")]
    Unavailable(String),
}

/// Notification delivered to a node's coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationEvent {
    /// The set of pending commands under the node's path changed.
    CommandsChanged,
    /// The cluster membership changed; carries the encoded node descriptors.
    MetadataChanged(Vec<u8>),
}

#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Names of the pending commands under `node_path`, sorted.
    async fn list_commands(&self, node_path: &str) -> Result<Vec<String>>;

    /// Data stored at `path`, or `None` when the path holds nothing.
    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>>;

    async fn set_data(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Removes `path`, acknowledging the command stored there.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Process-local coordination service.
///
/// Used by standalone nodes and tests. Creating or deleting a child path
/// notifies whoever watches its parent, like a child watch would.
#[derive(Debug, Default)]
pub struct InMemoryCoordination {
    entries: DashMap<String, Vec<u8>>,
    watchers: DashMap<String, mpsc::UnboundedSender<CoordinationEvent>>,
}

impl InMemoryCoordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the watcher for `node_path`, replacing any previous one.
    pub fn watch(&self, node_path: &str) -> mpsc::UnboundedReceiver<CoordinationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.insert(node_path.to_string(), tx);
        rx
    }

    /// Creates or overwrites `path`.
    pub fn create(&self, path: &str, data: impl Into<Vec<u8>>) {
        let fresh = self.entries.insert(path.to_string(), data.into()).is_none();
        if fresh {
            self.notify_parent(path);
        }
    }

    /// Pushes a membership change to the watcher of `node_path`.
    pub fn publish_ring(&self, node_path: &str, descriptors: impl Into<Vec<u8>>) {
        self.notify(node_path, CoordinationEvent::MetadataChanged(descriptors.into()));
    }

    pub fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.get(path).map(|entry| entry.value().clone())
    }

    fn notify_parent(&self, path: &str) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.notify(parent, CoordinationEvent::CommandsChanged);
        }
    }

    fn notify(&self, node_path: &str, event: CoordinationEvent) {
        let sender = self.watchers.get(node_path).map(|w| w.value().clone());
        if let Some(sender) = sender {
            if sender.send(event).is_err() {
                debug!(node_path, "watcher gone, dropping notification");
                self.watchers.remove(node_path);
            }
        }
    }
}

#[async_trait]
impl CoordinationClient for InMemoryCoordination {
    async fn list_commands(&self, node_path: &str) -> Result<Vec<String>> {
        if !self.entries.contains_key(node_path) {
            return Err(CoordinationError::NoNode(node_path.to_string()));
        }
        let prefix = format!("{}/", node_path);
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter_map(|entry| {
                entry
                    .key()
                    .strip_prefix(&prefix)
                    .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let data = self
            .entries
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        Ok(if data.is_empty() { None } else { Some(data) })
    }

    async fn set_data(&self, path: &str, data: Vec<u8>) -> Result<()> {
        match self.entries.get_mut(path) {
            Some(mut entry) => {
                *entry.value_mut() = data;
                Ok(())
            }
            None => Err(CoordinationError::NoNode(path.to_string())),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.entries
            .remove(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        self.notify_parent(path);
        Ok(())
    }
}
