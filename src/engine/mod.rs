pub mod command;
pub mod privilege;
pub mod report;
pub mod supervisor;
pub mod tail;
pub mod topology;
pub mod watchdog;

use std::path::Path;
use std::time::Duration;

pub use command::{build_command, CommandSpec, CopyMode, EngineArg, EngineInvocation, LogTarget};
pub use privilege::{resolve_copy_mode, PrivilegeProbe, SystemPrivilegeProbe};
pub use report::{parse_report, Counters, ReportStats};
pub use supervisor::ProcessSupervisor;
pub use topology::PathTopology;
pub use watchdog::{Clock, MonitorOutcome, SystemClock, Watchdog, WatchdogSettings, WatchdogState};

/// Exit codes at or above this value mean the engine hit an irrecoverable failure.
/// Lower codes are bit flags: 1 copied, 2 extras, 4 mismatches.
pub const FAILURE_THRESHOLD: i32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("copy engine binary `{binary}` was not found")]
    MissingBinary { binary: String },
    #[error("failed to launch copy engine `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("lost track of copy engine process: {source}")]
    Supervise {
        #[source]
        source: std::io::Error,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What the supervisor observed for one engine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedRun {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub idle_for: Option<Duration>,
    pub started_at: i64,
    pub duration: Duration,
    /// Log content written during this run only.
    pub report_text: String,
    pub stderr: String,
}

impl SupervisedRun {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && matches!(self.exit_code, Some(code) if (0..FAILURE_THRESHOLD).contains(&code))
    }
}

/// Runs one engine invocation to completion, forwarding log lines to `sink` as they
/// appear.
pub trait CopyEngine {
    fn run(
        &self,
        invocation: &EngineInvocation,
        sink: &mut dyn FnMut(&str),
    ) -> Result<SupervisedRun, EngineError>;
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.display().to_string(),
        source,
    }
}
