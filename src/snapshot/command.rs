use super::{Snapshot, SnapshotError, SnapshotProvider};
use crate::config::SnapshotConfig;
use std::process::{Command, Output, Stdio};

/// Snapshot provider backed by external helper commands.
///
/// The create command receives `{volume}` and prints `{"id": ..., "root": ...}` on stdout.
/// The release command receives `{volume}` and `{id}`.
#[derive(Debug, Clone)]
pub struct CommandSnapshotProvider {
    create_command: Vec<String>,
    release_command: Vec<String>,
}

impl CommandSnapshotProvider {
    pub fn new(create_command: Vec<String>, release_command: Vec<String>) -> Self {
        Self {
            create_command,
            release_command,
        }
    }

    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self::new(config.create_command.clone(), config.release_command.clone())
    }
}

impl SnapshotProvider for CommandSnapshotProvider {
    fn create(&self, volume: &str) -> Result<Snapshot, SnapshotError> {
        let argv = render(&self.create_command, volume, None);
        let output = run_helper(&argv)?;
        let binary = argv.first().cloned().unwrap_or_default();
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim())
            .map_err(|source| SnapshotError::Parse { binary, source })
    }

    fn release(&self, volume: &str, snapshot: Option<&Snapshot>) -> Result<(), SnapshotError> {
        let id = snapshot.map(|snapshot| snapshot.id.as_str());
        // Without an id there is nothing to name for a per-snapshot release.
        if id.is_none() && self.release_command.iter().any(|arg| arg.contains("{id}")) {
            return Ok(());
        }
        run_helper(&render(&self.release_command, volume, id)).map(|_| ())
    }
}

fn render(template: &[String], volume: &str, id: Option<&str>) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            let arg = arg.replace("{volume}", volume);
            match id {
                Some(id) => arg.replace("{id}", id),
                None => arg,
            }
        })
        .collect()
}

fn run_helper(argv: &[String]) -> Result<Output, SnapshotError> {
    let Some((binary, args)) = argv.split_first() else {
        return Err(SnapshotError::NotConfigured("empty command".to_string()));
    };
    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SnapshotError::MissingBinary {
                    binary: binary.clone(),
                }
            } else {
                SnapshotError::Spawn {
                    binary: binary.clone(),
                    source,
                }
            }
        })?;
    if !output.status.success() {
        return Err(SnapshotError::CommandFailed {
            binary: binary.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}
