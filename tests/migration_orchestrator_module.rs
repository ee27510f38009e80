use migctl::config::MigrationConfig;
use migctl::engine::{CopyEngine, EngineError, EngineInvocation, PrivilegeProbe, SupervisedRun};
use migctl::history::HistoryStore;
use migctl::migration::{
    GateRefusal, MigrationError, Operator, PathProbe, Phase, PhaseInvocation, PhaseOrchestrator,
    PhaseOutcome, RunReport,
};
use migctl::notify::{Notifier, NotifyError};
use migctl::shared::state_paths::StatePaths;
use migctl::snapshot::{Snapshot, SnapshotError, SnapshotProvider};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

const CLEAN_REPORT: &str = "   Dirs :  10  8  2  0  0  0\n  Files : 100 95  5  0  0  0\n  Bytes : 5.2g 5.1g\n";
const PARTIAL_REPORT: &str = "   Dirs :  10  8  2  0  0  0\n  Files : 100 95  3  0  2  0\n  Bytes : 5.2g 5.1g\n";

struct FakeEngine {
    responses: RefCell<VecDeque<(i32, &'static str)>>,
    calls: RefCell<Vec<EngineInvocation>>,
}

impl FakeEngine {
    fn new(responses: &[(i32, &'static str)]) -> Self {
        Self {
            responses: RefCell::new(responses.iter().copied().collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl CopyEngine for FakeEngine {
    fn run(
        &self,
        invocation: &EngineInvocation,
        sink: &mut dyn FnMut(&str),
    ) -> Result<SupervisedRun, EngineError> {
        self.calls.borrow_mut().push(invocation.clone());
        let (code, text) = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or((0, CLEAN_REPORT));
        for line in text.lines() {
            sink(line);
        }
        Ok(SupervisedRun {
            exit_code: Some(code),
            timed_out: false,
            idle_for: None,
            started_at: 1_706_739_300,
            duration: Duration::from_secs(2),
            report_text: text.to_string(),
            stderr: String::new(),
        })
    }
}

#[derive(Default)]
struct ScriptedOperator {
    answers: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
    lines: RefCell<Vec<String>>,
    warnings: RefCell<Vec<String>>,
}

impl ScriptedOperator {
    fn answering(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            ..Self::default()
        }
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or(false)
    }

    fn show_line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

struct NoPrivilege;

impl PrivilegeProbe for NoPrivilege {
    fn holds_backup_privilege(&self) -> bool {
        false
    }
}

struct Reachability(bool);

impl PathProbe for Reachability {
    fn is_reachable(&self, _path: &str) -> bool {
        self.0
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: RefCell<Vec<RunReport>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, report: &RunReport) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(report.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeSnapshots {
    releases: RefCell<usize>,
}

impl SnapshotProvider for FakeSnapshots {
    fn create(&self, _volume: &str) -> Result<Snapshot, SnapshotError> {
        Ok(Snapshot {
            id: "snap-7".to_string(),
            root: "\\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy7".to_string(),
        })
    }

    fn release(&self, _volume: &str, _snapshot: Option<&Snapshot>) -> Result<(), SnapshotError> {
        *self.releases.borrow_mut() += 1;
        Ok(())
    }
}

struct Harness {
    config: MigrationConfig,
    state: StatePaths,
    engine: FakeEngine,
    operator: ScriptedOperator,
    notifier: RecordingNotifier,
    snapshots: FakeSnapshots,
    reachable: Reachability,
}

impl Harness {
    fn new(root: &Path, responses: &[(i32, &'static str)], answers: &[bool]) -> Self {
        let mut config = MigrationConfig::new("D:\\Shares\\Finance", "\\\\nas01\\finance");
        config.state_dir = root.to_path_buf();
        Self {
            config,
            state: StatePaths::new(root),
            engine: FakeEngine::new(responses),
            operator: ScriptedOperator::answering(answers),
            notifier: RecordingNotifier::default(),
            snapshots: FakeSnapshots::default(),
            reachable: Reachability(true),
        }
    }

    fn run(&self, invocation: PhaseInvocation) -> Result<PhaseOutcome, MigrationError> {
        PhaseOrchestrator {
            config: &self.config,
            state: self.state.clone(),
            engine: &self.engine,
            operator: &self.operator,
            privilege: &NoPrivilege,
            reachability: &self.reachable,
            snapshots: Some(&self.snapshots),
            notifier: &self.notifier,
        }
        .run(&invocation)
    }

    fn history(&self) -> HistoryStore {
        HistoryStore::new(self.state.history_path())
    }

    fn event_log(&self) -> String {
        fs::read_to_string(self.state.event_log_path()).unwrap_or_default()
    }
}

fn mirror(confirm: bool, preview: bool) -> PhaseInvocation {
    PhaseInvocation {
        confirm_execution: confirm,
        preview,
        ..PhaseInvocation::new(Phase::Mirror)
    }
}

#[test]
fn mirror_without_confirmation_flag_is_refused_before_any_copy() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[], &[true]);

    let outcome = harness.run(mirror(false, false)).expect("run");

    assert_eq!(
        outcome,
        PhaseOutcome::NotConfirmed(GateRefusal::MissingExecutionConfirmation)
    );
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(harness.engine.call_count(), 0);
    assert!(harness.operator.prompts.borrow().is_empty());
    assert!(!harness.state.history_path().exists());
    assert!(harness.event_log().contains("gate.mirror.refused"));
}

#[test]
fn mirror_without_prior_reconcile_and_no_override_never_runs_engine() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[], &[false]);

    let outcome = harness.run(mirror(true, false)).expect("run");

    assert_eq!(
        outcome,
        PhaseOutcome::NotConfirmed(GateRefusal::NoReconcileOnRecord)
    );
    assert_eq!(harness.engine.call_count(), 0);
    assert_eq!(harness.operator.prompts.borrow().len(), 1);
    assert!(harness
        .operator
        .warnings
        .borrow()
        .iter()
        .any(|w| w.contains("no RECONCILE run is on record")));
}

#[test]
fn mirror_preview_bypasses_gates_and_records_nothing() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(3, CLEAN_REPORT)], &[]);

    let outcome = harness.run(mirror(false, true)).expect("run");

    let report = outcome.report().expect("completed");
    assert!(report.dry_run);
    assert_eq!(outcome.exit_code(), 0);
    let calls = harness.engine.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains_switch("/L"));
    assert!(calls[0].contains_switch("/MIR"));
    assert!(harness.operator.prompts.borrow().is_empty());
    assert!(!harness.state.history_path().exists());
    assert!(harness.notifier.sent.borrow().is_empty());
}

#[test]
fn any_reconcile_on_record_opens_the_mirror_gate() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(16, ""), (1, CLEAN_REPORT)], &[true]);

    let reconcile = harness
        .run(PhaseInvocation::new(Phase::Reconcile))
        .expect("reconcile");
    assert_eq!(reconcile.exit_code(), 16);
    assert!(harness
        .history()
        .has_succeeded(Phase::Reconcile)
        .expect("history"));

    let outcome = harness.run(mirror(true, false)).expect("mirror");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(harness.engine.call_count(), 2);
    // Only the RECONCILE confirmation was asked; no override prompt.
    assert_eq!(harness.operator.prompts.borrow().len(), 1);
    assert_eq!(harness.history().load().expect("load").runs.len(), 2);
}

#[test]
fn operator_override_lets_mirror_run_without_reconcile() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(2, CLEAN_REPORT)], &[true]);

    let outcome = harness.run(mirror(true, false)).expect("run");

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(harness.engine.call_count(), 1);
    assert!(harness.event_log().contains("gate.mirror.override"));
}

#[test]
fn declined_reconcile_is_neutral() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[], &[false]);

    let outcome = harness
        .run(PhaseInvocation::new(Phase::Reconcile))
        .expect("run");

    assert_eq!(outcome, PhaseOutcome::Declined);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(harness.engine.call_count(), 0);
}

#[test]
fn reconcile_runs_from_destination_back_to_source() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(0, CLEAN_REPORT)], &[true]);

    harness
        .run(PhaseInvocation::new(Phase::Reconcile))
        .expect("run");

    let tokens = harness.engine.calls.borrow()[0].to_tokens();
    assert_eq!(tokens[0], "\\\\nas01\\finance");
    assert_eq!(tokens[1], "D:\\Shares\\Finance");
}

#[test]
fn completed_sync_appends_exactly_one_entry_and_notifies() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(1, CLEAN_REPORT)], &[]);

    let outcome = harness.run(PhaseInvocation::new(Phase::Sync)).expect("run");

    let report = outcome.report().expect("completed").clone();
    assert!(report.success);
    assert_eq!(report.total_dirs, 10);
    assert_eq!(report.copied_files, 95);
    assert_eq!(report.copied_bytes, "5.1g");
    assert!(report.log_path.contains("sync-"));

    let history = harness.history().load().expect("load");
    assert_eq!(history.runs, vec![report.clone()]);
    assert_eq!(*harness.notifier.sent.borrow(), vec![report]);
    assert!(harness
        .operator
        .lines
        .borrow()
        .iter()
        .any(|line| line.contains("Files : 100 95")));

    let log = harness.event_log();
    assert!(log.contains("phase.started"));
    assert!(log.contains("history.appended"));
}

#[test]
fn network_endpoints_use_network_retry_budget() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(0, CLEAN_REPORT)], &[]);

    harness.run(PhaseInvocation::new(Phase::Seed)).expect("run");

    let tokens = harness.engine.calls.borrow()[0].to_tokens();
    assert!(tokens.contains(&"/R:10".to_string()));
    assert!(tokens.contains(&"/W:30".to_string()));
    assert!(tokens.contains(&"/Z".to_string()));
    assert!(tokens.contains(&"/XO".to_string()));
}

#[test]
fn force_backup_and_append_log_override_config() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(0, CLEAN_REPORT)], &[]);

    harness
        .run(PhaseInvocation {
            force_backup: true,
            append_log: Some(true),
            ..PhaseInvocation::new(Phase::Sync)
        })
        .expect("run");

    let calls = harness.engine.calls.borrow();
    assert!(calls[0].contains_switch("/ZB"));
    assert!(calls[0].log.append);
    assert!(calls[0].log_path().ends_with("logs/sync.log"));
}

#[test]
fn unreachable_network_endpoint_fails_before_any_copy() {
    let temp = tempdir().expect("tempdir");
    let mut harness = Harness::new(temp.path(), &[], &[]);
    harness.reachable = Reachability(false);

    let err = harness
        .run(PhaseInvocation::new(Phase::Sync))
        .expect_err("unreachable");

    assert!(matches!(
        err,
        MigrationError::UnreachablePath { role: "destination", .. }
    ));
    assert_eq!(harness.engine.call_count(), 0);
}

#[test]
fn failed_files_trigger_snapshot_retry_when_requested() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(
        temp.path(),
        &[(8, PARTIAL_REPORT), (1, CLEAN_REPORT)],
        &[],
    );

    let outcome = harness
        .run(PhaseInvocation {
            snapshot_fallback: true,
            ..PhaseInvocation::new(Phase::Sync)
        })
        .expect("run");

    let report = outcome.report().expect("completed");
    assert!(!report.success);
    let fallback = report.fallback.as_ref().expect("fallback");
    assert!(fallback.attempted);
    assert!(fallback.success);
    assert_eq!(fallback.snapshot_id.as_deref(), Some("snap-7"));
    assert_eq!(outcome.exit_code(), 0);

    let calls = harness.engine.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].to_tokens()[0].starts_with("\\\\?\\GLOBALROOT"));
    assert!(calls[1]
        .log_path()
        .to_string_lossy()
        .ends_with("-snapshot.log"));
    assert_eq!(*harness.snapshots.releases.borrow(), 1);
    assert_eq!(harness.history().load().expect("load").runs.len(), 1);
}

#[test]
fn failed_files_without_the_flag_do_not_retry() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(8, PARTIAL_REPORT)], &[]);

    let outcome = harness.run(PhaseInvocation::new(Phase::Sync)).expect("run");

    assert_eq!(outcome.exit_code(), 8);
    assert!(outcome.report().expect("completed").fallback.is_none());
    assert_eq!(harness.engine.call_count(), 1);
}

#[test]
fn corrupt_history_is_treated_as_empty_and_flagged() {
    let temp = tempdir().expect("tempdir");
    let harness = Harness::new(temp.path(), &[(0, CLEAN_REPORT)], &[true]);
    fs::write(harness.state.history_path(), "[[[").expect("corrupt history");

    let outcome = harness.run(mirror(true, false)).expect("run");

    assert_eq!(outcome.exit_code(), 0);
    let warnings = harness.operator.warnings.borrow();
    assert!(warnings.iter().any(|w| w.contains("RUN HISTORY IS UNREADABLE")));
    assert!(warnings.iter().any(|w| w.contains("RUN HISTORY WAS CORRUPT")));
    assert_eq!(harness.history().load().expect("load").runs.len(), 1);
    assert!(harness.event_log().contains("history.corrupt"));
}
