pub mod cli;
pub mod console;

pub use cli::{Cli, Commands, HistoryArgs, RunArgs};
pub use console::ConsoleOperator;

use crate::config::{default_config_path, load_migration_config, LoadedConfig, MigrationConfig};
use crate::engine::{ProcessSupervisor, SystemPrivilegeProbe};
use crate::history::HistoryStore;
use crate::migration::{
    FsPathProbe, MigrationError, PhaseOrchestrator, PhaseOutcome, INTERNAL_FAILURE_EXIT_CODE,
};
use crate::notify::{format_duration, summary_text, NoopNotifier, Notifier, WebhookNotifier};
use crate::shared::state_paths::StatePaths;
use crate::shared::time::rfc3339;
use crate::snapshot::{CommandSnapshotProvider, SnapshotProvider};
use clap::Parser;
use std::any::Any;
use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Parses arguments, runs the command, and returns the process exit status. Errors and
/// panics are trapped here and logged with their full cause chain.
pub fn run_cli<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };

    let loaded = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {}", error_chain(&err));
            return err.exit_code();
        }
    };
    let state = StatePaths::new(&loaded.config.state_dir);
    let events = state.event_log();
    for warning in &loaded.warnings {
        eprintln!("warning: config {warning}");
        events.warn("config.corrected", &warning.to_string());
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatch(&cli.command, &loaded.config, &state)
    }));
    match outcome {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            let chain = error_chain(&err);
            eprintln!("error: {chain}");
            events.error("run.failed", &chain);
            err.exit_code()
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            eprintln!("internal failure: {message}");
            events.error("run.panicked", &message);
            INTERNAL_FAILURE_EXIT_CODE
        }
    }
}

fn load_config(cli: &Cli) -> Result<LoadedConfig, MigrationError> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    Ok(load_migration_config(&path)?)
}

fn dispatch(
    command: &Commands,
    config: &MigrationConfig,
    state: &StatePaths,
) -> Result<i32, MigrationError> {
    match command {
        Commands::Run(args) => run_phase(args, config, state),
        Commands::History(args) => print_history(args, state),
    }
}

fn run_phase(
    args: &RunArgs,
    config: &MigrationConfig,
    state: &StatePaths,
) -> Result<i32, MigrationError> {
    let engine = ProcessSupervisor::from_config(&config.watchdog);
    let snapshots = config.snapshot.as_ref().map(CommandSnapshotProvider::from_config);
    let notifier: Box<dyn Notifier> = match &config.notify {
        Some(notify) => Box::new(WebhookNotifier::from_config(notify)),
        None => Box::new(NoopNotifier),
    };
    let orchestrator = PhaseOrchestrator {
        config,
        state: state.clone(),
        engine: &engine,
        operator: &ConsoleOperator,
        privilege: &SystemPrivilegeProbe,
        reachability: &FsPathProbe,
        snapshots: snapshots.as_ref().map(|p| p as &dyn SnapshotProvider),
        notifier: notifier.as_ref(),
    };

    let outcome = orchestrator.run(&args.invocation())?;
    match &outcome {
        PhaseOutcome::Completed(report) => {
            println!();
            println!("{}", summary_text(report));
            println!("log: {}", report.log_path);
        }
        PhaseOutcome::Declined => println!("{} cancelled by operator", args.phase),
        PhaseOutcome::NotConfirmed(refusal) => eprintln!("{}", refusal.message()),
    }
    Ok(outcome.exit_code())
}

fn print_history(args: &HistoryArgs, state: &StatePaths) -> Result<i32, MigrationError> {
    let history = HistoryStore::new(state.history_path()).load()?;
    if args.json {
        let body = serde_json::to_string_pretty(&history)
            .map_err(|err| MigrationError::History(crate::history::HistoryError::Encode(err)))?;
        println!("{body}");
        return Ok(0);
    }
    if history.runs.is_empty() {
        println!("no runs recorded in {}", state.history_path().display());
        return Ok(0);
    }

    let skip = args
        .limit
        .map(|limit| history.runs.len().saturating_sub(limit))
        .unwrap_or(0);
    println!(
        "{:<10} {:<26} {:>5} {:<7} {:>9} {:>9} {:>7} {:>10} {:>9}",
        "PHASE", "STARTED", "EXIT", "RESULT", "FILES", "COPIED", "FAILED", "BYTES", "DURATION"
    );
    for run in history.runs.iter().skip(skip) {
        let result = match (run.dry_run, run.effective_success()) {
            (true, _) => "preview",
            (false, true) => "ok",
            (false, false) if run.timed_out => "stalled",
            (false, false) => "failed",
        };
        println!(
            "{:<10} {:<26} {:>5} {:<7} {:>9} {:>9} {:>7} {:>10} {:>9}",
            run.phase.as_str(),
            rfc3339(run.started_at),
            run.exit_code,
            result,
            run.total_files,
            run.copied_files,
            run.failed_files,
            run.copied_bytes,
            format_duration(Duration::from_millis(run.duration_ms)),
        );
    }
    if let Some(last) = &history.last_run {
        println!(
            "last run: {} at {} ({})",
            last.phase,
            last.timestamp,
            if last.success { "succeeded" } else { "failed" }
        );
    }
    Ok(0)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
