use crate::shared::time::{now_secs, rfc3339};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    timestamp: String,
    level: EventLevel,
    event: &'a str,
    message: &'a str,
}

/// JSON-lines event log under the state directory. Writes are best-effort: logging
/// never decides the outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, event: &str, message: &str) {
        self.record(EventLevel::Info, event, message);
    }

    pub fn warn(&self, event: &str, message: &str) {
        self.record(EventLevel::Warn, event, message);
    }

    pub fn error(&self, event: &str, message: &str) {
        self.record(EventLevel::Error, event, message);
    }

    pub fn record(&self, level: EventLevel, event: &str, message: &str) {
        let record = EventRecord {
            timestamp: rfc3339(now_secs()),
            level,
            event,
            message,
        };
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        let _ = self.append_line(&line);
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}
