use crate::migration::RunReport;

pub const SUCCESS_EXIT_CODE: i32 = 0;
pub const NOT_CONFIRMED_EXIT_CODE: i32 = 1;
pub const INTERNAL_FAILURE_EXIT_CODE: i32 = 99;
pub const WATCHDOG_TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    /// A non-preview MIRROR was requested without the execution-confirmation flag.
    MissingExecutionConfirmation,
    /// No RECONCILE is on record and the operator did not override.
    NoReconcileOnRecord,
}

impl GateRefusal {
    pub fn message(self) -> &'static str {
        match self {
            GateRefusal::MissingExecutionConfirmation => {
                "MIRROR deletes destination files absent from the source; pass --confirm to execute it or --preview to list changes"
            }
            GateRefusal::NoReconcileOnRecord => {
                "MIRROR cancelled: no RECONCILE run is on record and no override was given"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed(RunReport),
    /// The operator declined a confirmation prompt. Neutral, not an error.
    Declined,
    NotConfirmed(GateRefusal),
}

impl PhaseOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            PhaseOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            PhaseOutcome::Completed(report) if report.effective_success() => SUCCESS_EXIT_CODE,
            PhaseOutcome::Completed(report) if report.timed_out => WATCHDOG_TIMEOUT_EXIT_CODE,
            PhaseOutcome::Completed(report) if report.exit_code > 0 => report.exit_code,
            // Killed by a signal without the watchdog's involvement.
            PhaseOutcome::Completed(_) => INTERNAL_FAILURE_EXIT_CODE,
            PhaseOutcome::Declined => SUCCESS_EXIT_CODE,
            PhaseOutcome::NotConfirmed(_) => NOT_CONFIRMED_EXIT_CODE,
        }
    }
}
