pub mod command;
pub mod fallback;

pub use command::CommandSnapshotProvider;
pub use fallback::{FallbackOutcome, SnapshotFallback, SnapshotLease};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot helper `{binary}` was not found")]
    MissingBinary { binary: String },
    #[error("snapshot helper is not configured: {0}")]
    NotConfigured(String),
    #[error("failed to run snapshot helper `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot helper `{binary}` exited with {status}: {stderr}")]
    CommandFailed {
        binary: String,
        status: String,
        stderr: String,
    },
    #[error("snapshot helper `{binary}` printed an unreadable snapshot description: {source}")]
    Parse {
        binary: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A read-only point-in-time view of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    /// Root the snapshot is exposed at, standing in for the volume root.
    pub root: String,
}

pub trait SnapshotProvider {
    fn create(&self, volume: &str) -> Result<Snapshot, SnapshotError>;

    /// Asks the provider to delete the snapshot. `None` means creation did not report a
    /// snapshot, and the provider should clean up whatever it may have left behind.
    fn release(&self, volume: &str, snapshot: Option<&Snapshot>) -> Result<(), SnapshotError>;
}
