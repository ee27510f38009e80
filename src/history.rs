use crate::migration::{Phase, RunReport};
use crate::shared::fs_atomic::{atomic_write_file, move_aside};
use crate::shared::time::{now_secs, rfc3339};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to read run history {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("run history {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write run history {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode run history: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRun {
    pub timestamp: String,
    pub phase: Phase,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunHistory {
    #[serde(default)]
    pub runs: Vec<RunReport>,
    #[serde(default)]
    pub last_run: Option<LastRun>,
}

impl RunHistory {
    pub fn contains_phase(&self, phase: Phase) -> bool {
        self.runs.iter().any(|run| run.phase == phase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub entries: usize,
    /// Where an unreadable history file was moved before starting over.
    pub recovered_from: Option<PathBuf>,
}

/// Append-only JSON run history, rewritten wholesale on every append. There is no
/// cross-process locking; one orchestrator per history file is assumed.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// An absent history file is an empty history.
    pub fn load(&self) -> Result<RunHistory, HistoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RunHistory::default())
            }
            Err(source) => {
                return Err(HistoryError::Read {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(RunHistory::default());
        }
        serde_json::from_str(&raw).map_err(|source| HistoryError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// True when any entry for `phase` exists, whatever its outcome.
    pub fn has_succeeded(&self, phase: Phase) -> Result<bool, HistoryError> {
        Ok(self.load()?.contains_phase(phase))
    }

    pub fn append(&self, report: &RunReport) -> Result<AppendReceipt, HistoryError> {
        let (mut history, recovered_from) = match self.load() {
            Ok(history) => (history, None),
            Err(HistoryError::Corrupt { .. }) => {
                let aside = self.quarantine()?;
                (RunHistory::default(), Some(aside))
            }
            Err(err) => return Err(err),
        };

        history.runs.push(report.clone());
        history.last_run = Some(LastRun {
            timestamp: rfc3339(now_secs()),
            phase: report.phase,
            success: report.effective_success(),
        });

        let body = serde_json::to_vec_pretty(&history).map_err(HistoryError::Encode)?;
        atomic_write_file(&self.path, &body).map_err(|source| HistoryError::Write {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(AppendReceipt {
            entries: history.runs.len(),
            recovered_from,
        })
    }

    fn quarantine(&self) -> Result<PathBuf, HistoryError> {
        move_aside(&self.path, &format!("corrupt-{}", now_secs())).map_err(|source| {
            HistoryError::Write {
                path: self.path.display().to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report(phase: Phase, success: bool) -> RunReport {
        RunReport {
            phase,
            source: "D:\\a".to_string(),
            destination: "E:\\b".to_string(),
            started_at: 1_706_739_300,
            duration_ms: 10,
            total_dirs: 1,
            total_files: 2,
            copied_files: 2,
            skipped_files: 0,
            failed_files: 0,
            extra_files: 0,
            copied_bytes: "2048".to_string(),
            exit_code: if success { 1 } else { 8 },
            success,
            timed_out: false,
            log_path: "logs/run.log".to_string(),
            dry_run: false,
            fallback: None,
        }
    }

    #[test]
    fn missing_history_is_empty() {
        let dir = tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("history.json"));
        assert_eq!(store.load().expect("load"), RunHistory::default());
        assert!(!store.has_succeeded(Phase::Reconcile).expect("query"));
    }

    #[test]
    fn append_keeps_order_and_updates_last_run() {
        let dir = tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("state/history.json"));

        store.append(&report(Phase::Seed, true)).expect("seed");
        let receipt = store.append(&report(Phase::Sync, false)).expect("sync");
        assert_eq!(receipt.entries, 2);
        assert!(receipt.recovered_from.is_none());

        let history = store.load().expect("load");
        let phases: Vec<Phase> = history.runs.iter().map(|run| run.phase).collect();
        assert_eq!(phases, vec![Phase::Seed, Phase::Sync]);
        let last = history.last_run.expect("last run");
        assert_eq!(last.phase, Phase::Sync);
        assert!(!last.success);
    }

    #[test]
    fn failed_reconcile_still_satisfies_the_query() {
        let dir = tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("history.json"));
        store
            .append(&report(Phase::Reconcile, false))
            .expect("append");
        assert!(store.has_succeeded(Phase::Reconcile).expect("query"));
        assert!(!store.has_succeeded(Phase::Mirror).expect("query"));
    }

    #[test]
    fn corrupt_history_is_reported_then_quarantined_on_append() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").expect("seed corrupt file");
        let store = HistoryStore::new(&path);

        assert!(matches!(
            store.has_succeeded(Phase::Reconcile),
            Err(HistoryError::Corrupt { .. })
        ));

        let receipt = store.append(&report(Phase::Sync, true)).expect("append");
        assert_eq!(receipt.entries, 1);
        let aside = receipt.recovered_from.expect("quarantined");
        assert_eq!(fs::read_to_string(aside).expect("read aside"), "{ not json");
        assert_eq!(store.load().expect("load").runs.len(), 1);
    }
}
