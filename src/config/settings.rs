use super::ConfigError;
use crate::engine::topology::PathTopology;
use crate::migration::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_THREADS: u32 = 1;
pub const MAX_THREADS: u32 = 128;
pub const MIN_RETRY_COUNT: u32 = 1;
pub const MIN_WAIT_SECONDS: u32 = 1;

/// Immutable per-run settings. Built once at startup and handed by reference to every
/// component that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MigrationConfig {
    pub source: String,
    pub destination: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_engine_binary")]
    pub engine_binary: String,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_true")]
    pub preserve_acls: bool,
    #[serde(default)]
    pub throttle_ipg_ms: u32,
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub exclude_files: Vec<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub backup_mode: BackupMode,
    #[serde(default)]
    pub append_log: bool,
    #[serde(default = "default_phase_options")]
    pub phase_options: BTreeMap<Phase, String>,
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
    #[serde(default)]
    pub snapshot: Option<SnapshotConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default = "default_local_retry_count")]
    pub local_retry_count: u32,
    #[serde(default = "default_local_wait_seconds")]
    pub local_wait_seconds: u32,
    #[serde(default = "default_network_retry_count")]
    pub network_retry_count: u32,
    #[serde(default = "default_network_wait_seconds")]
    pub network_wait_seconds: u32,
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u32,
}

/// Retry budget handed to the engine for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub retry_count: u32,
    pub wait_seconds: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            local_retry_count: default_local_retry_count(),
            local_wait_seconds: default_local_wait_seconds(),
            network_retry_count: default_network_retry_count(),
            network_wait_seconds: default_network_wait_seconds(),
            max_retry_count: default_max_retry_count(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl RetryPolicy {
    /// Retry values for a topology, clamped to the configured bounds. Network values never
    /// drop below the local ones, whatever the raw configuration says.
    pub fn for_topology(&self, topology: PathTopology) -> RetrySettings {
        let max_retry = self.max_retry_count.max(MIN_RETRY_COUNT);
        let max_wait = self.max_wait_seconds.max(MIN_WAIT_SECONDS);
        let local = RetrySettings {
            retry_count: self.local_retry_count.clamp(MIN_RETRY_COUNT, max_retry),
            wait_seconds: self.local_wait_seconds.clamp(MIN_WAIT_SECONDS, max_wait),
        };
        match topology {
            PathTopology::Local => local,
            PathTopology::Network => RetrySettings {
                retry_count: self
                    .network_retry_count
                    .clamp(MIN_RETRY_COUNT, max_retry)
                    .max(local.retry_count),
                wait_seconds: self
                    .network_wait_seconds
                    .clamp(MIN_WAIT_SECONDS, max_wait)
                    .max(local.wait_seconds),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatchdogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout_seconds: default_idle_timeout_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

impl WatchdogConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// Use backup-capable copy mode when the running principal holds the privilege.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyOn {
    #[default]
    Always,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotifyConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub notify_on: NotifyOn,
}

/// Argv templates for the external snapshot helper. `{volume}` and `{id}` are substituted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SnapshotConfig {
    pub create_command: Vec<String>,
    pub release_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl MigrationConfig {
    /// Minimal config for the given endpoints with every other field at its default.
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            state_dir: default_state_dir(),
            engine_binary: default_engine_binary(),
            threads: default_threads(),
            preserve_acls: true,
            throttle_ipg_ms: 0,
            exclude_dirs: Vec::new(),
            exclude_files: Vec::new(),
            retry: RetryPolicy::default(),
            watchdog: WatchdogConfig::default(),
            backup_mode: BackupMode::Auto,
            append_log: false,
            phase_options: default_phase_options(),
            notify: None,
            snapshot: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::Invalid("`source` must be non-empty".to_string()));
        }
        if self.destination.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "`destination` must be non-empty".to_string(),
            ));
        }
        if self.engine_binary.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "`engine_binary` must be non-empty".to_string(),
            ));
        }
        if let Some(notify) = &self.notify {
            if !notify.webhook_url.starts_with("http://")
                && !notify.webhook_url.starts_with("https://")
            {
                return Err(ConfigError::Invalid(
                    "`notify.webhook_url` must be an http(s) url".to_string(),
                ));
            }
        }
        if let Some(snapshot) = &self.snapshot {
            if snapshot.create_command.is_empty() || snapshot.release_command.is_empty() {
                return Err(ConfigError::Invalid(
                    "`snapshot.create_command` and `snapshot.release_command` must be non-empty"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Pulls every bounded value into range. Corrections are returned, never raised.
    pub fn normalize(mut self) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        let threads = self.threads.clamp(MIN_THREADS, MAX_THREADS);
        if threads != self.threads {
            warnings.push(corrected("threads", self.threads, threads));
            self.threads = threads;
        }

        let retry = &mut self.retry;
        if retry.max_retry_count < MIN_RETRY_COUNT {
            warnings.push(corrected(
                "retry.max_retry_count",
                retry.max_retry_count,
                MIN_RETRY_COUNT,
            ));
            retry.max_retry_count = MIN_RETRY_COUNT;
        }
        if retry.max_wait_seconds < MIN_WAIT_SECONDS {
            warnings.push(corrected(
                "retry.max_wait_seconds",
                retry.max_wait_seconds,
                MIN_WAIT_SECONDS,
            ));
            retry.max_wait_seconds = MIN_WAIT_SECONDS;
        }

        let local = retry.for_topology(PathTopology::Local);
        let network = retry.for_topology(PathTopology::Network);
        for (field, value, bounded) in [
            (
                "retry.local_retry_count",
                &mut retry.local_retry_count,
                local.retry_count,
            ),
            (
                "retry.local_wait_seconds",
                &mut retry.local_wait_seconds,
                local.wait_seconds,
            ),
            (
                "retry.network_retry_count",
                &mut retry.network_retry_count,
                network.retry_count,
            ),
            (
                "retry.network_wait_seconds",
                &mut retry.network_wait_seconds,
                network.wait_seconds,
            ),
        ] {
            if *value != bounded {
                warnings.push(corrected(field, *value, bounded));
                *value = bounded;
            }
        }

        if self.watchdog.idle_timeout_seconds == 0 {
            warnings.push(corrected("watchdog.idle_timeout_seconds", 0, 1));
            self.watchdog.idle_timeout_seconds = 1;
        }
        if self.watchdog.poll_interval_seconds == 0 {
            warnings.push(corrected("watchdog.poll_interval_seconds", 0, 1));
            self.watchdog.poll_interval_seconds = 1;
        }

        (self, warnings)
    }

    pub fn phase_options(&self, phase: Phase) -> &str {
        self.phase_options
            .get(&phase)
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn corrected(field: &'static str, from: impl std::fmt::Display, to: impl std::fmt::Display) -> ConfigWarning {
    ConfigWarning {
        field,
        message: format!("value {from} is out of bounds; using {to}"),
    }
}

fn default_true() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".migctl")
}

fn default_engine_binary() -> String {
    "robocopy".to_string()
}

fn default_threads() -> u32 {
    16
}

fn default_local_retry_count() -> u32 {
    3
}

fn default_local_wait_seconds() -> u32 {
    5
}

fn default_network_retry_count() -> u32 {
    10
}

fn default_network_wait_seconds() -> u32 {
    30
}

fn default_max_retry_count() -> u32 {
    100
}

fn default_max_wait_seconds() -> u32 {
    600
}

fn default_idle_timeout_seconds() -> u64 {
    30 * 60
}

fn default_poll_interval_seconds() -> u64 {
    15
}

fn default_phase_options() -> BTreeMap<Phase, String> {
    BTreeMap::from([(Phase::Seed, "/XC /XN /XO".to_string())])
}
