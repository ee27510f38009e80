use crate::config::MigrationConfig;
use crate::engine::{ReportStats, SupervisedRun};
use crate::migration::Phase;
use crate::snapshot::FallbackOutcome;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Resolved parameters for one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub phase: Phase,
    pub source: String,
    pub destination: String,
    pub dry_run: bool,
    pub custom_options: String,
}

impl RunRequest {
    pub fn for_phase(config: &MigrationConfig, phase: Phase, dry_run: bool) -> Self {
        let (source, destination) = if phase.is_reversed() {
            (config.destination.clone(), config.source.clone())
        } else {
            (config.source.clone(), config.destination.clone())
        };
        Self {
            phase,
            source,
            destination,
            dry_run,
            custom_options: config.phase_options(phase).to_string(),
        }
    }
}

/// Outcome of one engine run as persisted to history and handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub phase: Phase,
    pub source: String,
    pub destination: String,
    pub started_at: i64,
    pub duration_ms: u64,
    pub total_dirs: u64,
    pub total_files: u64,
    pub copied_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
    pub extra_files: u64,
    pub copied_bytes: String,
    pub exit_code: i32,
    pub success: bool,
    #[serde(default)]
    pub timed_out: bool,
    pub log_path: String,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackOutcome>,
}

impl RunReport {
    pub fn from_run(
        request: &RunRequest,
        run: &SupervisedRun,
        stats: &ReportStats,
        log_path: &Path,
    ) -> Self {
        Self {
            phase: request.phase,
            source: request.source.clone(),
            destination: request.destination.clone(),
            started_at: run.started_at,
            duration_ms: u64::try_from(run.duration.as_millis()).unwrap_or(u64::MAX),
            total_dirs: stats.dirs.total,
            total_files: stats.files.total,
            copied_files: stats.files.copied,
            skipped_files: stats.files.skipped,
            failed_files: stats.files.failed,
            extra_files: stats.files.extra,
            copied_bytes: stats.copied_bytes.clone(),
            exit_code: run.exit_code.unwrap_or(-1),
            success: run.succeeded(),
            timed_out: run.timed_out,
            log_path: log_path.display().to_string(),
            dry_run: request.dry_run,
            fallback: None,
        }
    }

    /// A failed primary run still counts as a success when the snapshot retry succeeded.
    pub fn effective_success(&self) -> bool {
        self.success
            || self
                .fallback
                .as_ref()
                .is_some_and(|fallback| fallback.success)
    }
}
