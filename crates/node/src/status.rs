use std::fmt;

/// Service level of a node.
///
/// Transitions are driven only by coordination commands. A node starts out
/// [`NodeStatus::Stopped`] until it is told to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeStatus {
    /// Full read/write service.
    Running,
    /// No client requests are served.
    #[default]
    Stopped,
    /// Reads are served, writes are rejected while data is migrating.
    WriteLocked,
}

impl NodeStatus {
    pub fn accepts_reads(&self) -> bool {
        !matches!(self, NodeStatus::Stopped)
    }

    pub fn accepts_writes(&self) -> bool {
        matches!(self, NodeStatus::Running)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Running => "RUNNING",
            NodeStatus::Stopped => "STOPPED",
            NodeStatus::WriteLocked => "WRITE_LOCKED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_stopped() {
        assert_eq!(NodeStatus::default(), NodeStatus::Stopped);
        assert!(!NodeStatus::default().accepts_reads());
    }

    #[test]
    fn test_write_lock_serves_reads_only() {
        assert!(NodeStatus::WriteLocked.accepts_reads());
        assert!(!NodeStatus::WriteLocked.accepts_writes());
        assert!(NodeStatus::Running.accepts_writes());
    }
}
