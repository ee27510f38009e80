use crate::migration::{Phase, PhaseInvocation};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Phase-gated bulk data migration on top of an external copy engine.
#[derive(Debug, Parser)]
#[command(name = "migctl", version)]
pub struct Cli {
    /// Config file. Defaults to `$MIGCTL_CONFIG`, then `~/.migctl/config.yaml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one migration phase.
    Run(RunArgs),
    /// List recorded runs.
    History(HistoryArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// SEED, SYNC, RECONCILE or MIRROR (any case).
    #[arg(value_parser = Phase::parse)]
    pub phase: Phase,

    /// List what would change without copying or deleting anything.
    #[arg(long)]
    pub preview: bool,

    /// Required to execute MIRROR for real.
    #[arg(long)]
    pub confirm: bool,

    /// Use backup copy mode even when the privilege probe says otherwise.
    #[arg(long)]
    pub force_backup: bool,

    /// Append to the phase's shared log instead of writing a fresh one.
    #[arg(long, conflicts_with = "no_append_log")]
    pub append_log: bool,

    #[arg(long)]
    pub no_append_log: bool,

    /// Retry from a volume snapshot when files fail to copy.
    #[arg(long)]
    pub snapshot_fallback: bool,
}

impl RunArgs {
    pub fn invocation(&self) -> PhaseInvocation {
        PhaseInvocation {
            phase: self.phase,
            preview: self.preview,
            confirm_execution: self.confirm,
            force_backup: self.force_backup,
            append_log: match (self.append_log, self.no_append_log) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            snapshot_fallback: self.snapshot_fallback,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    /// Print the stored history document as JSON.
    #[arg(long)]
    pub json: bool,

    /// Only show the most recent N runs.
    #[arg(long)]
    pub limit: Option<usize>,
}
