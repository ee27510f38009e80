#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("migration config validation failed: {0}")]
    Invalid(String),
    #[error("failed to resolve home directory for default config path")]
    HomeDirectoryUnavailable,
}
