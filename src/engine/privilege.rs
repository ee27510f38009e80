use crate::config::BackupMode;
use crate::engine::command::CopyMode;

pub trait PrivilegeProbe {
    fn holds_backup_privilege(&self) -> bool;
}

/// Asks the OS whether the current principal may bypass file ACLs for backup.
/// Queried on every run because privileges can be granted or dropped between runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPrivilegeProbe;

impl PrivilegeProbe for SystemPrivilegeProbe {
    #[cfg(windows)]
    fn holds_backup_privilege(&self) -> bool {
        std::process::Command::new("whoami")
            .arg("/priv")
            .stderr(std::process::Stdio::null())
            .output()
            .map(|output| has_backup_privilege_line(&String::from_utf8_lossy(&output.stdout)))
            .unwrap_or(false)
    }

    #[cfg(not(windows))]
    fn holds_backup_privilege(&self) -> bool {
        false
    }
}

/// `whoami /priv` lists the privilege whether or not it is enabled; holding it is enough
/// because the engine enables it itself.
#[cfg_attr(not(windows), allow(dead_code))]
fn has_backup_privilege_line(output: &str) -> bool {
    output
        .lines()
        .any(|line| line.trim_start().starts_with("SeBackupPrivilege"))
}

pub fn resolve_copy_mode(
    preference: BackupMode,
    force_backup: bool,
    probe: &dyn PrivilegeProbe,
) -> CopyMode {
    if force_backup {
        return CopyMode::Backup;
    }
    match preference {
        BackupMode::Always => CopyMode::Backup,
        BackupMode::Never => CopyMode::Restartable,
        BackupMode::Auto if probe.holds_backup_privilege() => CopyMode::Backup,
        BackupMode::Auto => CopyMode::Restartable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingProbe {
        holds: bool,
        calls: Cell<u32>,
    }

    impl PrivilegeProbe for CountingProbe {
        fn holds_backup_privilege(&self) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.holds
        }
    }

    #[test]
    fn auto_mode_follows_the_probe_each_time() {
        let probe = CountingProbe {
            holds: true,
            calls: Cell::new(0),
        };
        assert_eq!(resolve_copy_mode(BackupMode::Auto, false, &probe), CopyMode::Backup);
        assert_eq!(resolve_copy_mode(BackupMode::Auto, false, &probe), CopyMode::Backup);
        assert_eq!(probe.calls.get(), 2);

        let probe = CountingProbe {
            holds: false,
            calls: Cell::new(0),
        };
        assert_eq!(
            resolve_copy_mode(BackupMode::Auto, false, &probe),
            CopyMode::Restartable
        );
    }

    #[test]
    fn explicit_preferences_and_override_skip_the_probe() {
        let probe = CountingProbe {
            holds: false,
            calls: Cell::new(0),
        };
        assert_eq!(resolve_copy_mode(BackupMode::Never, true, &probe), CopyMode::Backup);
        assert_eq!(resolve_copy_mode(BackupMode::Always, false, &probe), CopyMode::Backup);
        assert_eq!(
            resolve_copy_mode(BackupMode::Never, false, &probe),
            CopyMode::Restartable
        );
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn privilege_listing_is_matched_by_name() {
        let listing = "Privilege Name                Description                    State\n\
                       ============================= ============================== ========\n\
                       SeBackupPrivilege             Back up files and directories  Disabled\n";
        assert!(has_backup_privilege_line(listing));
        assert!(!has_backup_privilege_line("SeShutdownPrivilege  Shut down  Disabled"));
    }
}
