pub mod error;
pub mod operator;
pub mod orchestrator;
pub mod outcome;
pub mod phase;
pub mod report;

pub use error::{MigrationError, VALIDATION_FAILURE_EXIT_CODE};
pub use operator::{FsPathProbe, Operator, PathProbe};
pub use orchestrator::{PhaseInvocation, PhaseOrchestrator};
pub use outcome::{
    GateRefusal, PhaseOutcome, INTERNAL_FAILURE_EXIT_CODE, NOT_CONFIRMED_EXIT_CODE,
    SUCCESS_EXIT_CODE, WATCHDOG_TIMEOUT_EXIT_CODE,
};
pub use phase::Phase;
pub use report::{RunReport, RunRequest};
