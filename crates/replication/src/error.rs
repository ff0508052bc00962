//! Error types for replication.

use std::fmt;
use std::time::Duration;

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("failed to connect to replica {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("replica stream error: {0}")]
    Streaming(#[from] streaming::StreamingError),

    #[error("replica {target} rejected write: {reason}")]
    Rejected { target: String, reason: String },

    #[error("replica link to {0} is closed")]
    Disconnected(String),

    #[error("replica {target} did not answer within {timeout:?}")]
    Timeout { target: String, timeout: Duration },
}

/// One target that did not receive a forwarded write.
#[derive(Debug)]
pub struct ForwardFailure {
    pub target: String,
    pub error: ReplicationError,
}

/// Partial failure of a fan-out: the write reached `delivered` links but not
/// the ones listed in `failures`.
#[derive(Debug, thiserror::Error)]
pub struct ForwardError {
    pub delivered: usize,
    pub failures: Vec<ForwardFailure>,
}

impl ForwardError {
    /// Names of the targets that missed the write.
    pub fn targets(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.target.as_str()).collect()
    }
}

impl fmt::Display for ForwardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forwarding failed for ")?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} ({})", failure.target, failure.error)?;
        }
        write!(f, "; delivered to {}", self.delivered)
    }
}
