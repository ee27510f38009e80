use crate::config::MigrationConfig;
use crate::engine::{
    build_command, parse_report, resolve_copy_mode, CommandSpec, CopyEngine, CopyMode, LogTarget,
    PathTopology, PrivilegeProbe,
};
use crate::history::HistoryStore;
use crate::migration::{
    GateRefusal, MigrationError, Operator, PathProbe, Phase, PhaseOutcome, RunReport, RunRequest,
};
use crate::notify::{format_duration, Notifier};
use crate::shared::logging::EventLevel;
use crate::shared::state_paths::StatePaths;
use crate::shared::time::now_secs;
use crate::snapshot::{FallbackOutcome, SnapshotFallback, SnapshotProvider};

/// What the operator asked for on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseInvocation {
    pub phase: Phase,
    /// List-only run: no mutation, no history entry, no notification.
    pub preview: bool,
    pub confirm_execution: bool,
    pub force_backup: bool,
    /// Overrides `append_log` from the config when set.
    pub append_log: Option<bool>,
    pub snapshot_fallback: bool,
}

impl PhaseInvocation {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            preview: false,
            confirm_execution: false,
            force_backup: false,
            append_log: None,
            snapshot_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateDecision {
    Proceed,
    Declined,
    Refused(GateRefusal),
}

/// Runs one phase end to end: gates, preflight, engine run, snapshot retry, history,
/// and notification.
pub struct PhaseOrchestrator<'a> {
    pub config: &'a MigrationConfig,
    pub state: StatePaths,
    pub engine: &'a dyn CopyEngine,
    pub operator: &'a dyn Operator,
    pub privilege: &'a dyn PrivilegeProbe,
    pub reachability: &'a dyn PathProbe,
    pub snapshots: Option<&'a dyn SnapshotProvider>,
    pub notifier: &'a dyn Notifier,
}

impl PhaseOrchestrator<'_> {
    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(self.state.history_path())
    }

    pub fn run(&self, invocation: &PhaseInvocation) -> Result<PhaseOutcome, MigrationError> {
        let phase = invocation.phase;
        let request = RunRequest::for_phase(self.config, phase, invocation.preview);
        let history = self.history();
        self.log(
            EventLevel::Info,
            "phase.requested",
            &format!(
                "phase={phase} preview={} source={} destination={}",
                invocation.preview, request.source, request.destination
            ),
        );

        match self.check_gates(invocation, &history) {
            GateDecision::Proceed => {}
            GateDecision::Declined => {
                self.log(EventLevel::Info, "gate.declined", &format!("phase={phase}"));
                return Ok(PhaseOutcome::Declined);
            }
            GateDecision::Refused(refusal) => {
                self.operator.warn(refusal.message());
                self.log(
                    EventLevel::Warn,
                    "gate.mirror.refused",
                    &format!("phase={phase} reason={refusal:?}"),
                );
                return Ok(PhaseOutcome::NotConfirmed(refusal));
            }
        }

        self.preflight(&request)?;

        let copy_mode =
            resolve_copy_mode(self.config.backup_mode, invocation.force_backup, self.privilege);
        let started_at = now_secs();
        let append = invocation.append_log.unwrap_or(self.config.append_log);
        let topology = PathTopology::of_pair(&request.source, &request.destination);
        let spec = CommandSpec {
            phase,
            source: &request.source,
            destination: &request.destination,
            topology,
            dry_run: request.dry_run,
            copy_mode,
            custom_options: &request.custom_options,
            log: LogTarget {
                path: self.state.engine_log_path(phase, started_at, append),
                append,
            },
        };
        let engine_invocation = build_command(&spec, self.config);
        let command_line = engine_invocation.command_line();
        self.operator.show_line(&command_line);
        self.log(
            EventLevel::Info,
            "phase.started",
            &format!("phase={phase} topology={topology} copy_mode={copy_mode:?} command={command_line}"),
        );

        let run = self
            .engine
            .run(&engine_invocation, &mut |line: &str| self.operator.show_line(line))
            .map_err(|err| {
                self.log(EventLevel::Error, "engine.failed", &format!("phase={phase} error={err}"));
                MigrationError::from(err)
            })?;

        let stats = parse_report(&run.report_text);
        let mut report =
            RunReport::from_run(&request, &run, &stats, engine_invocation.log_path());

        if run.timed_out {
            let idle = run.idle_for.map(format_duration).unwrap_or_default();
            self.operator.warn(&format!(
                "copy engine log stopped growing for {idle}; the engine was terminated and the destination is left as-is"
            ));
            self.log(
                EventLevel::Warn,
                "watchdog.timeout",
                &format!("phase={phase} idle={idle} log={}", report.log_path),
            );
        } else {
            self.log(
                EventLevel::Info,
                "engine.exited",
                &format!(
                    "phase={phase} exit_code={} success={} failed_files={}",
                    report.exit_code, report.success, report.failed_files
                ),
            );
        }
        if !run.stderr.trim().is_empty() {
            self.log(EventLevel::Warn, "engine.stderr", run.stderr.trim());
        }

        if !request.dry_run
            && !run.timed_out
            && invocation.snapshot_fallback
            && report.failed_files > 0
        {
            report.fallback = Some(self.snapshot_retry(&request, copy_mode, started_at));
        }

        if !request.dry_run {
            self.record(&history, &report);
            if let Err(err) = self.notifier.notify(&report) {
                self.operator.warn(&format!("notification was not delivered: {err}"));
                self.log(EventLevel::Warn, "notify.failed", &err.to_string());
            }
        }

        let success = report.effective_success();
        self.log(
            if success { EventLevel::Info } else { EventLevel::Error },
            "phase.completed",
            &format!(
                "phase={phase} success={success} exit_code={} duration_ms={}",
                report.exit_code, report.duration_ms
            ),
        );
        Ok(PhaseOutcome::Completed(report))
    }

    fn check_gates(&self, invocation: &PhaseInvocation, history: &HistoryStore) -> GateDecision {
        if invocation.preview {
            return GateDecision::Proceed;
        }
        match invocation.phase {
            Phase::Reconcile => {
                if self.operator.confirm(
                    "RECONCILE copies from the destination back to the source. Continue?",
                ) {
                    GateDecision::Proceed
                } else {
                    GateDecision::Declined
                }
            }
            Phase::Mirror => {
                if !invocation.confirm_execution {
                    return GateDecision::Refused(GateRefusal::MissingExecutionConfirmation);
                }
                let reconciled = match history.has_succeeded(Phase::Reconcile) {
                    Ok(found) => found,
                    Err(err) => {
                        self.operator.warn(&format!(
                            "RUN HISTORY IS UNREADABLE ({err}); treating it as empty. The RECONCILE-before-MIRROR check cannot be trusted."
                        ));
                        self.log(EventLevel::Warn, "history.corrupt", &err.to_string());
                        false
                    }
                };
                if reconciled {
                    return GateDecision::Proceed;
                }
                self.operator.warn(
                    "no RECONCILE run is on record; MIRROR deletes destination files that are absent from the source",
                );
                self.log(EventLevel::Warn, "gate.mirror.no_reconcile", "awaiting operator override");
                if self.operator.confirm("Run MIRROR without a prior RECONCILE?") {
                    self.log(EventLevel::Warn, "gate.mirror.override", "operator overrode the RECONCILE check");
                    GateDecision::Proceed
                } else {
                    GateDecision::Refused(GateRefusal::NoReconcileOnRecord)
                }
            }
            Phase::Seed | Phase::Sync => GateDecision::Proceed,
        }
    }

    fn preflight(&self, request: &RunRequest) -> Result<(), MigrationError> {
        for (role, path) in [
            ("source", &request.source),
            ("destination", &request.destination),
        ] {
            if PathTopology::classify(path) == PathTopology::Network
                && !self.reachability.is_reachable(path)
            {
                self.log(EventLevel::Error, "preflight.unreachable", &format!("{role}={path}"));
                return Err(MigrationError::UnreachablePath {
                    role,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    fn snapshot_retry(
        &self,
        request: &RunRequest,
        copy_mode: CopyMode,
        started_at: i64,
    ) -> FallbackOutcome {
        let Some(provider) = self.snapshots else {
            self.operator
                .warn("snapshot fallback was requested but no snapshot helper is configured");
            self.log(EventLevel::Warn, "snapshot.skipped", "no snapshot provider configured");
            return FallbackOutcome::skipped("no snapshot provider is configured");
        };

        self.operator.warn("files failed to copy; retrying from a volume snapshot");
        self.log(EventLevel::Info, "snapshot.retry", &format!("source={}", request.source));
        let fallback = SnapshotFallback {
            provider,
            engine: self.engine,
            config: self.config,
        };
        let log = LogTarget {
            path: self.state.snapshot_log_path(request.phase, started_at),
            append: false,
        };
        let outcome = fallback.retry(request, copy_mode, log, &mut |line: &str| {
            self.operator.show_line(line)
        });

        match (&outcome.error, outcome.attempted) {
            (Some(error), false) => {
                self.operator.warn(&format!("snapshot retry skipped: {error}"));
                self.log(EventLevel::Warn, "snapshot.skipped", error);
            }
            (Some(error), true) => {
                self.log(EventLevel::Error, "snapshot.failed", error);
            }
            (None, _) => self.log(
                EventLevel::Info,
                "snapshot.completed",
                &format!(
                    "success={} exit_code={:?} failed_files={}",
                    outcome.success, outcome.exit_code, outcome.failed_files
                ),
            ),
        }
        match &outcome.release_error {
            Some(error) => {
                self.operator.warn(&format!("snapshot release failed: {error}"));
                self.log(EventLevel::Warn, "snapshot.release_failed", error);
            }
            None if outcome.snapshot_id.is_some() => {
                self.log(EventLevel::Info, "snapshot.released", outcome.snapshot_id.as_deref().unwrap_or(""));
            }
            None => {}
        }
        outcome
    }

    fn record(&self, history: &HistoryStore, report: &RunReport) {
        match history.append(report) {
            Ok(receipt) => {
                if let Some(aside) = receipt.recovered_from {
                    self.operator.warn(&format!(
                        "RUN HISTORY WAS CORRUPT; it was moved to {} and a new history was started",
                        aside.display()
                    ));
                    self.log(EventLevel::Warn, "history.recovered", &aside.display().to_string());
                }
                self.log(
                    EventLevel::Info,
                    "history.appended",
                    &format!("phase={} entries={}", report.phase, receipt.entries),
                );
            }
            Err(err) => {
                self.operator.warn(&format!("run was not recorded in history: {err}"));
                self.log(EventLevel::Error, "history.write_failed", &err.to_string());
            }
        }
    }

    fn log(&self, level: EventLevel, event: &str, message: &str) {
        self.state.event_log().record(level, event, message);
    }
}
