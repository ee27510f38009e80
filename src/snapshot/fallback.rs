use super::{Snapshot, SnapshotError, SnapshotProvider};
use crate::config::MigrationConfig;
use crate::engine::topology::{rebase_onto, volume_root};
use crate::engine::{
    build_command, parse_report, CommandSpec, CopyEngine, CopyMode, LogTarget, PathTopology,
};
use crate::migration::RunRequest;
use serde::{Deserialize, Serialize};

/// A created snapshot that is released exactly once: explicitly through
/// [`SnapshotLease::release`], or on drop when the holder unwinds or returns early.
pub struct SnapshotLease<'a> {
    provider: &'a dyn SnapshotProvider,
    volume: String,
    snapshot: Snapshot,
    released: bool,
}

impl<'a> SnapshotLease<'a> {
    /// Creates a snapshot of `volume`. A failed creation still asks the provider to clean
    /// up before the error is returned.
    pub fn acquire(provider: &'a dyn SnapshotProvider, volume: &str) -> Result<Self, SnapshotError> {
        match provider.create(volume) {
            Ok(snapshot) => Ok(Self {
                provider,
                volume: volume.to_string(),
                snapshot,
                released: false,
            }),
            Err(err) => {
                let _ = provider.release(volume, None);
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn release(mut self) -> Result<(), SnapshotError> {
        self.released = true;
        self.provider.release(&self.volume, Some(&self.snapshot))
    }
}

impl Drop for SnapshotLease<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.provider.release(&self.volume, Some(&self.snapshot));
        }
    }
}

/// Result of a snapshot retry, attached to the primary run's report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FallbackOutcome {
    /// Whether the engine was run against a snapshot at all.
    pub attempted: bool,
    pub snapshot_id: Option<String>,
    pub source: Option<String>,
    pub log_path: Option<String>,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub timed_out: bool,
    pub copied_files: u64,
    pub failed_files: u64,
    pub error: Option<String>,
    pub release_error: Option<String>,
}

impl FallbackOutcome {
    pub fn skipped(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Retries a run against a point-in-time snapshot of the source volume.
pub struct SnapshotFallback<'a> {
    pub provider: &'a dyn SnapshotProvider,
    pub engine: &'a dyn CopyEngine,
    pub config: &'a MigrationConfig,
}

impl SnapshotFallback<'_> {
    pub fn retry(
        &self,
        request: &RunRequest,
        copy_mode: CopyMode,
        log: LogTarget,
        sink: &mut dyn FnMut(&str),
    ) -> FallbackOutcome {
        let Some(volume) = volume_root(&request.source) else {
            return FallbackOutcome::skipped(format!(
                "source {} is not on a snapshot-capable volume",
                request.source
            ));
        };
        let lease = match SnapshotLease::acquire(self.provider, &volume) {
            Ok(lease) => lease,
            Err(err) => {
                return FallbackOutcome::skipped(format!("snapshot of {volume} failed: {err}"))
            }
        };
        let snapshot = lease.snapshot().clone();

        let Some(source) = rebase_onto(&request.source, &volume, &snapshot.root) else {
            let release_error = lease.release().err().map(|err| err.to_string());
            return FallbackOutcome {
                snapshot_id: Some(snapshot.id),
                release_error,
                ..FallbackOutcome::skipped(format!(
                    "{} does not lie beneath volume {volume}",
                    request.source
                ))
            };
        };

        let spec = CommandSpec {
            phase: request.phase,
            source: &source,
            destination: &request.destination,
            topology: PathTopology::of_pair(&source, &request.destination),
            dry_run: false,
            copy_mode,
            custom_options: &request.custom_options,
            log: log.clone(),
        };
        let invocation = build_command(&spec, self.config);
        let result = self.engine.run(&invocation, sink);
        let release_error = lease.release().err().map(|err| err.to_string());

        let mut outcome = FallbackOutcome {
            attempted: true,
            snapshot_id: Some(snapshot.id),
            source: Some(source),
            log_path: Some(log.path.display().to_string()),
            release_error,
            ..FallbackOutcome::default()
        };
        match result {
            Ok(run) => {
                let stats = parse_report(&run.report_text);
                outcome.exit_code = run.exit_code;
                outcome.success = run.succeeded();
                outcome.timed_out = run.timed_out;
                outcome.copied_files = stats.files.copied;
                outcome.failed_files = stats.files.failed;
            }
            Err(err) => outcome.error = Some(err.to_string()),
        }
        outcome
    }
}
