use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::history::HistoryError;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("{role} path {path} is not reachable")]
    UnreachablePath { role: &'static str, path: String },
    #[error("copy engine binary `{binary}` was not found; install it or set `engine_binary`")]
    MissingEngineBinary { binary: String },
    #[error(transparent)]
    Engine(EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

impl From<EngineError> for MigrationError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MissingBinary { binary } => MigrationError::MissingEngineBinary { binary },
            other => MigrationError::Engine(other),
        }
    }
}

/// Exit status for operator errors caught before any copy started.
pub const VALIDATION_FAILURE_EXIT_CODE: i32 = 2;

impl MigrationError {
    pub fn exit_code(&self) -> i32 {
        match self {
            MigrationError::UnreachablePath { .. }
            | MigrationError::MissingEngineBinary { .. }
            | MigrationError::Config(_) => VALIDATION_FAILURE_EXIT_CODE,
            MigrationError::Engine(_) | MigrationError::History(_) => {
                crate::migration::INTERNAL_FAILURE_EXIT_CODE
            }
        }
    }
}
