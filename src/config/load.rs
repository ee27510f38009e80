use super::{ConfigError, ConfigWarning, MigrationConfig};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: MigrationConfig,
    pub warnings: Vec<ConfigWarning>,
}

/// Reads, validates, and normalises the config. Out-of-bounds values are corrected and
/// reported as warnings rather than failing the load.
pub fn load_migration_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let raw = MigrationConfig::from_path(path)?;
    raw.validate()?;
    let (config, warnings) = raw.normalize();
    Ok(LoadedConfig { config, warnings })
}
