use crate::config::ConfigError;
use std::path::PathBuf;

pub const GLOBAL_CONFIG_DIR: &str = ".migctl";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const CONFIG_PATH_ENV: &str = "MIGCTL_CONFIG";

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(explicit) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(explicit));
    }
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home)
        .join(GLOBAL_CONFIG_DIR)
        .join(CONFIG_FILE_NAME))
}
