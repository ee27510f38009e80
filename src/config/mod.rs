pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_migration_config, LoadedConfig};
pub use paths::{default_config_path, CONFIG_FILE_NAME, CONFIG_PATH_ENV, GLOBAL_CONFIG_DIR};
pub use settings::{
    BackupMode, ConfigWarning, MigrationConfig, NotifyConfig, NotifyOn, RetryPolicy,
    RetrySettings, SnapshotConfig, WatchdogConfig, MAX_THREADS,
};
