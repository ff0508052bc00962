//! Node lifecycle driven by coordination events.
//!
//! The coordinator drains one event at a time. Every event re-reads the
//! pending command list; exactly one recognised command is acted on per
//! event. Anything slow (migration transfers, replica reconnects) runs on a
//! spawned task so the loop stays ready for the next event.

use crate::coordination::{CoordinationClient, CoordinationError, CoordinationEvent};
use crate::error::{NodeError, Result};
use crate::migration::{send_range, EngineSink, MigrationOrder};
use crate::state::NodeState;
use corelib::HashRing;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use streaming::MigrationReceiver;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Commands the coordination service can leave under a node's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Stop,
    /// Open a migration receiver, publish its port, lock writes.
    Receive,
    /// Stream a hash range to another node's receiver.
    Send,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "Start",
            Command::Stop => "Stop",
            Command::Receive => "Receive",
            Command::Send => "Send",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Start" => Ok(Command::Start),
            "Stop" => Ok(Command::Stop),
            "Receive" => Ok(Command::Receive),
            "Send" => Ok(Command::Send),
            other => Err(NodeError::Configuration(format!("unknown command {:?}", other))),
        }
    }
}

pub struct NodeCoordinator {
    state: Arc<NodeState>,
    client: Arc<dyn CoordinationClient>,
    node_path: String,
    sending: Arc<AtomicBool>,
}

impl NodeCoordinator {
    pub fn new(state: Arc<NodeState>, client: Arc<dyn CoordinationClient>, node_path: impl Into<String>) -> Self {
        Self {
            state,
            client,
            node_path: node_path.into(),
            sending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn node_path(&self) -> &str {
        &self.node_path
    }

    fn command_path(&self, command: Command) -> String {
        format!("{}/{}", self.node_path, command)
    }

    /// Processes events until the channel closes. A failing event is logged
    /// and the loop moves on to the next one.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<CoordinationEvent>) {
        info!(path = %self.node_path, "coordinator listening");
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                error!(path = %self.node_path, error = %e, "unable to process coordination event");
            }
        }
        info!(path = %self.node_path, "coordination channel closed");
    }

    pub async fn handle_event(&self, event: CoordinationEvent) -> Result<()> {
        match event {
            CoordinationEvent::CommandsChanged => self.process_commands().await,
            CoordinationEvent::MetadataChanged(data) => self.apply_membership(&data),
        }
    }

    /// Acts on the single pending command, if any.
    ///
    /// A `Receive` whose port is already published, or a `Send` still in
    /// flight, is not pending. Two or more pending commands are rejected
    /// without acting on any of them.
    pub async fn process_commands(&self) -> Result<()> {
        let names = self.client.list_commands(&self.node_path).await?;
        let mut pending = Vec::new();
        for name in &names {
            let command = match name.parse::<Command>() {
                Ok(command) => command,
                Err(_) => {
                    debug!(name = %name, "ignoring unrecognised command");
                    continue;
                }
            };
            if self.is_pending(command).await? {
                pending.push(command);
            } else {
                debug!(%command, "command already in progress");
            }
        }

        match pending.as_slice() {
            [] => {
                debug!(path = %self.node_path, "no pending command");
                Ok(())
            }
            [command] => self.execute(*command).await,
            _ => Err(CoordinationError::ConflictingCommands(
                pending.iter().map(|c| c.to_string()).collect(),
            )
            .into()),
        }
    }

    async fn is_pending(&self, command: Command) -> Result<bool> {
        Ok(match command {
            Command::Start | Command::Stop => true,
            Command::Receive => self
                .client
                .get_data(&self.command_path(command))
                .await?
                .is_none(),
            Command::Send => !self.sending.load(Ordering::SeqCst),
        })
    }

    async fn execute(&self, command: Command) -> Result<()> {
        let path = self.command_path(command);
        match command {
            Command::Start => {
                self.state.start();
                self.client.delete(&path).await?;
                info!(node = %self.state.self_node().name(), "server started");
            }
            Command::Stop => {
                self.state.stop();
                self.client.delete(&path).await?;
                info!(node = %self.state.self_node().name(), "server stopped");
            }
            Command::Receive => self.receive(&path).await?,
            Command::Send => self.send(&path).await?,
        }
        Ok(())
    }

    async fn receive(&self, path: &str) -> Result<()> {
        let receiver = MigrationReceiver::bind(self.state.self_node().host()).await?;
        let port = receiver.port();
        let previous = self.state.status();
        self.state.lock_write();
        if let Err(e) = self
            .client
            .set_data(path, port.to_string().into_bytes())
            .await
        {
            // The port never got out, so no transfer will arrive.
            self.state.set_status(previous);
            return Err(e.into());
        }
        info!(port, "waiting for data transfer");

        let sink = Arc::new(EngineSink(self.state.engine().clone()));
        tokio::spawn(async move {
            match receiver.run(sink).await {
                Ok(count) => info!(port, count, "data transfer received"),
                Err(e) => error!(port, error = %e, "data transfer failed"),
            }
        });
        Ok(())
    }

    async fn send(&self, path: &str) -> Result<()> {
        let data = self
            .client
            .get_data(path)
            .await?
            .ok_or_else(|| NodeError::Configuration(format!("{} carries no migration order", path)))?;
        let order = MigrationOrder::from_json(&data)?;
        self.sending.store(true, Ordering::SeqCst);

        let engine = self.state.engine().clone();
        let client = self.client.clone();
        let sending = self.sending.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            match send_range(engine, order).await {
                Ok(count) => {
                    info!(count, "data transfer sent");
                    if let Err(e) = client.delete(&path).await {
                        warn!(path = %path, error = %e, "unable to acknowledge send");
                    }
                }
                Err(e) => error!(error = %e, "data transfer failed"),
            }
            sending.store(false, Ordering::SeqCst);
        });
        Ok(())
    }

    /// Rebuilds the ring from descriptor JSON and reconciles replica links
    /// in the background.
    fn apply_membership(&self, data: &[u8]) -> Result<()> {
        let ring = HashRing::from_json(data)?;
        info!(nodes = ring.len(), "membership changed");
        self.state.replace_ring(ring);

        let state = self.state.clone();
        tokio::spawn(async move {
            state.reconcile_replicas().await;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::InMemoryCoordination;
    use crate::status::NodeStatus;
    use async_trait::async_trait;
    use corelib::RingNode;
    use replication::{
        ReplicaConnector, ReplicaForwarderManager, ReplicaLink, SimpleStrategy, TcpConnector,
    };
    use std::time::Duration;
    use storage::{CacheStrategy, SledStore, StorageEngine};
    use streaming::{Request, Response};

    const PATH: &str = "/kvservers/self";

    /// Link that accepts every write without touching the network.
    struct NullLink {
        target: RingNode,
        open: AtomicBool,
    }

    #[async_trait]
    impl ReplicaLink for NullLink {
        fn target(&self) -> &RingNode {
            &self.target
        }

        fn is_connected(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        async fn forward(&self, _key: &str, _value: &str) -> replication::Result<()> {
            Ok(())
        }

        async fn disconnect(&self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    /// Opens [`NullLink`]s after a short delay, so reconciliations overlap.
    struct SlowConnector;

    #[async_trait]
    impl ReplicaConnector for SlowConnector {
        async fn connect(&self, target: &RingNode) -> replication::Result<Arc<dyn ReplicaLink>> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Arc::new(NullLink {
                target: target.clone(),
                open: AtomicBool::new(true),
            }))
        }
    }

    /// Serves reads but refuses every write.
    struct ReadOnlyCoordination(InMemoryCoordination);

    #[async_trait]
    impl CoordinationClient for ReadOnlyCoordination {
        async fn list_commands(&self, node_path: &str) -> crate::coordination::Result<Vec<String>> {
            self.0.list_commands(node_path).await
        }

        async fn get_data(&self, path: &str) -> crate::coordination::Result<Option<Vec<u8>>> {
            self.0.get_data(path).await
        }

        async fn set_data(&self, _path: &str, _data: Vec<u8>) -> crate::coordination::Result<()> {
            Err(CoordinationError::Unavailable("read-only session".into()))
        }

        async fn delete(&self, path: &str) -> crate::coordination::Result<()> {
            self.0.delete(path).await
        }
    }

    fn setup() -> (Arc<NodeState>, Arc<InMemoryCoordination>, NodeCoordinator) {
        let state = node_state(Arc::new(TcpConnector));
        let zk = Arc::new(InMemoryCoordination::new());
        zk.create(PATH, Vec::new());
        let coordinator = NodeCoordinator::new(state.clone(), zk.clone(), PATH);
        (state, zk, coordinator)
    }

    fn node_state(connector: Arc<dyn ReplicaConnector>) -> Arc<NodeState> {
        let engine = StorageEngine::new(
            Arc::new(SledStore::temporary().unwrap()),
            CacheStrategy::Fifo,
            8,
        )
        .unwrap();
        let self_node = RingNode::new("self", "127.0.0.1", 6100);
        let forwarder = ReplicaForwarderManager::new(
            self_node.clone(),
            Box::new(SimpleStrategy::default()),
            connector,
        );
        Arc::new(NodeState::new(self_node, Arc::new(engine), forwarder))
    }

    fn membership(ports: &[u16]) -> Vec<u8> {
        let mut nodes = vec![serde_json::json!({"name": "self", "host": "127.0.0.1", "port": 6100})];
        nodes.extend(
            ports
                .iter()
                .map(|port| serde_json::json!({"name": format!("n{}", port), "host": "127.0.0.1", "port": port})),
        );
        serde_json::to_vec(&nodes).unwrap()
    }

    fn expected_targets(state: &NodeState) -> Vec<String> {
        let ring = state.ring_snapshot();
        let mut names: Vec<String> = state
            .forwarder()
            .strategy()
            .replica_targets(&ring, state.self_node())
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        names.sort();
        names
    }

    async fn linked_targets(state: &NodeState) -> Vec<String> {
        let mut names: Vec<String> = state
            .forwarder()
            .targets()
            .await
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        names.sort();
        names
    }

    fn put(key: &str) -> Request {
        Request::Put {
            key: key.into(),
            value: "v".into(),
        }
    }

    #[test]
    fn test_command_names() {
        for command in [Command::Start, Command::Stop, Command::Receive, Command::Send] {
            assert_eq!(command.name().parse::<Command>().unwrap(), command);
        }
        assert!("start".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (state, zk, coordinator) = setup();

        zk.create("/kvservers/self/Start", Vec::new());
        coordinator.process_commands().await.unwrap();
        assert_eq!(state.status(), NodeStatus::Running);
        assert!(!zk.exists("/kvservers/self/Start"));

        zk.create("/kvservers/self/Stop", Vec::new());
        coordinator.process_commands().await.unwrap();
        assert_eq!(state.status(), NodeStatus::Stopped);
        assert!(!zk.exists("/kvservers/self/Stop"));
    }

    #[tokio::test]
    async fn test_no_pending_command_is_not_an_error() {
        let (state, zk, coordinator) = setup();
        zk.create("/kvservers/self/Unknown", Vec::new());
        coordinator.process_commands().await.unwrap();
        assert_eq!(state.status(), NodeStatus::Stopped);
    }

    #[tokio::test]
    async fn test_conflicting_commands_are_flagged() {
        let (state, zk, coordinator) = setup();
        zk.create("/kvservers/self/Start", Vec::new());
        zk.create("/kvservers/self/Stop", Vec::new());

        let err = coordinator.process_commands().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Coordination(CoordinationError::ConflictingCommands(_))
        ));
        assert_eq!(state.status(), NodeStatus::Stopped);
        assert!(zk.exists("/kvservers/self/Start"));
        assert!(zk.exists("/kvservers/self/Stop"));
    }

    #[tokio::test]
    async fn test_receive_locks_writes_until_start() {
        let (state, zk, coordinator) = setup();
        zk.create("/kvservers/self/Start", Vec::new());
        coordinator.process_commands().await.unwrap();
        assert!(matches!(state.handle(put("a")).await, Response::PutSuccess { .. }));

        zk.create("/kvservers/self/Receive", Vec::new());
        coordinator.process_commands().await.unwrap();
        assert_eq!(state.status(), NodeStatus::WriteLocked);
        let port: u16 = String::from_utf8(zk.data("/kvservers/self/Receive").unwrap())
            .unwrap()
            .parse()
            .unwrap();
        assert_ne!(port, 0);
        assert_eq!(state.handle(put("b")).await, Response::ServerWriteLock);
        assert!(matches!(
            state.handle(Request::Get { key: "a".into() }).await,
            Response::GetSuccess { .. }
        ));

        // The published Receive no longer counts, so Start is the only command.
        zk.create("/kvservers/self/Start", Vec::new());
        coordinator.process_commands().await.unwrap();
        assert_eq!(state.status(), NodeStatus::Running);
        assert!(matches!(state.handle(put("b")).await, Response::PutSuccess { .. }));
    }

    #[tokio::test]
    async fn test_membership_change_replaces_ring() {
        let (state, _zk, coordinator) = setup();
        let descriptors = br#"[
            {"name": "self", "host": "127.0.0.1", "port": 6100},
            {"name": "other", "host": "127.0.0.1", "port": 6101}
        ]"#;

        coordinator
            .handle_event(CoordinationEvent::MetadataChanged(descriptors.to_vec()))
            .await
            .unwrap();
        let ring = state.ring_snapshot();
        assert_eq!(ring.len(), 2);
        assert!(ring.node_by_name("other").is_some());
    }

    #[tokio::test]
    async fn test_failed_port_publish_leaves_writes_open() {
        let state = node_state(Arc::new(TcpConnector));
        let zk = InMemoryCoordination::new();
        zk.create(PATH, Vec::new());
        zk.create("/kvservers/self/Receive", Vec::new());
        let coordinator = NodeCoordinator::new(state.clone(), Arc::new(ReadOnlyCoordination(zk)), PATH);
        state.start();

        let err = coordinator.process_commands().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Coordination(CoordinationError::Unavailable(_))
        ));
        assert_eq!(state.status(), NodeStatus::Running);
        assert!(matches!(state.handle(put("a")).await, Response::PutSuccess { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rapid_membership_changes_settle_on_newest_ring() {
        for _ in 0..10 {
            let state = node_state(Arc::new(SlowConnector));
            let coordinator = NodeCoordinator::new(
                state.clone(),
                Arc::new(InMemoryCoordination::new()),
                PATH,
            );
            let (tx, events) = mpsc::unbounded_channel();
            let task = tokio::spawn(coordinator.run(events));

            tx.send(CoordinationEvent::MetadataChanged(membership(&[6101, 6102, 6103, 6104])))
                .unwrap();
            tx.send(CoordinationEvent::MetadataChanged(membership(&[6105, 6106])))
                .unwrap();
            drop(tx);
            task.await.unwrap();

            let expected = expected_targets(&state);
            assert!(!expected.is_empty());
            let mut settled = false;
            for _ in 0..100 {
                if linked_targets(&state).await == expected {
                    settled = true;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            assert!(settled, "replica links never matched the newest ring");

            // A stale reconciliation finishing late would undo the match.
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(linked_targets(&state).await, expected);
        }
    }

    #[tokio::test]
    async fn test_malformed_membership_keeps_ring() {
        let (state, _zk, coordinator) = setup();
        let result = coordinator
            .handle_event(CoordinationEvent::MetadataChanged(b"not json".to_vec()))
            .await;
        assert!(matches!(result, Err(NodeError::Ring(_))));
        assert!(state.ring_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_run_survives_failing_events() {
        let (state, zk, coordinator) = setup();
        let mut rx = zk.watch(PATH);
        let (tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(coordinator.run(events));

        tx.send(CoordinationEvent::MetadataChanged(b"[".to_vec())).unwrap();
        zk.create("/kvservers/self/Start", Vec::new());
        tx.send(rx.recv().await.unwrap()).unwrap();
        drop(tx);

        task.await.unwrap();
        assert_eq!(state.status(), NodeStatus::Running);
    }
}
