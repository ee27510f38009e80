use crate::migration::Phase;
use crate::shared::logging::EventLog;
use crate::shared::time::file_stamp;
use std::path::PathBuf;

/// Layout of the state directory: engine logs, the event log, and run history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.logs_dir().join("migctl.log")
    }

    pub fn event_log(&self) -> EventLog {
        EventLog::new(self.event_log_path())
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join("history.json")
    }

    /// `<phase>-<stamp>.log` for a fresh log, or the stable `<phase>.log` when runs of a
    /// phase share one appended log.
    pub fn engine_log_path(&self, phase: Phase, started_at: i64, append: bool) -> PathBuf {
        let name = phase.as_str().to_ascii_lowercase();
        if append {
            self.logs_dir().join(format!("{name}.log"))
        } else {
            self.logs_dir()
                .join(format!("{name}-{}.log", file_stamp(started_at)))
        }
    }

    pub fn snapshot_log_path(&self, phase: Phase, started_at: i64) -> PathBuf {
        let name = phase.as_str().to_ascii_lowercase();
        self.logs_dir()
            .join(format!("{name}-{}-snapshot.log", file_stamp(started_at)))
    }
}
