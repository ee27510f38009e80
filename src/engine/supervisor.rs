use crate::config::WatchdogConfig;
use crate::engine::tail::{read_from_offset, LogTailer};
use crate::engine::watchdog::{monitor, FileSizeProbe, MonitorOutcome, SystemClock, WatchdogSettings};
use crate::engine::{io_error, CopyEngine, EngineError, EngineInvocation, SupervisedRun};
use crate::shared::time::now_secs;
use std::fs;
use std::io::{BufRead, BufReader};
use std::process::{ChildStderr, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// How long stderr is still collected after the watchdog kills the engine. Processes the
/// engine started may keep the pipe open long after it is gone.
const STDERR_GRACE_AFTER_KILL: Duration = Duration::from_millis(500);

/// Launches the external copy engine, tails its log, and enforces the idle watchdog.
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    pub watchdog: Option<WatchdogSettings>,
}

impl ProcessSupervisor {
    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self {
            watchdog: config.enabled.then(|| WatchdogSettings {
                idle_timeout: config.idle_timeout(),
                poll_interval: config.poll_interval(),
            }),
        }
    }
}

impl CopyEngine for ProcessSupervisor {
    fn run(
        &self,
        invocation: &EngineInvocation,
        sink: &mut dyn FnMut(&str),
    ) -> Result<SupervisedRun, EngineError> {
        let log_path = invocation.log_path().to_path_buf();
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        // An appended log already holds earlier runs; only what follows belongs to us.
        let baseline = if invocation.log.append {
            fs::metadata(&log_path).map(|meta| meta.len()).unwrap_or(0)
        } else {
            0
        };

        let mut command = Command::new(&invocation.binary);
        command
            .args(invocation.to_tokens())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let started_at = now_secs();
        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::MissingBinary {
                    binary: invocation.binary.clone(),
                })
            }
            Err(source) => {
                return Err(EngineError::Spawn {
                    binary: invocation.binary.clone(),
                    source,
                })
            }
        };

        let stderr_lines = spawn_stderr_reader(child.stderr.take());

        let tailer = LogTailer::spawn(log_path.clone(), baseline);
        let probe = FileSizeProbe {
            path: log_path.clone(),
        };
        let outcome = monitor(&mut child, &SystemClock, &probe, self.watchdog, &mut || {
            for line in tailer.try_lines() {
                sink(&line);
            }
        });
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = tailer.finish();
                return Err(EngineError::Supervise { source });
            }
        };

        for line in tailer.finish() {
            sink(&line);
        }
        let (exit_code, timed_out, idle_for) = match outcome {
            MonitorOutcome::Exited { code } => (code, false, None),
            MonitorOutcome::IdleTimeout { idle, code } => (code, true, Some(idle)),
        };
        let stderr_deadline = timed_out.then(|| Instant::now() + STDERR_GRACE_AFTER_KILL);
        let stderr = collect_stderr(&stderr_lines, stderr_deadline);
        let duration = started.elapsed();
        let report_text = read_from_offset(&log_path, baseline).unwrap_or_default();

        Ok(SupervisedRun {
            exit_code,
            timed_out,
            idle_for,
            started_at,
            duration,
            report_text,
            stderr,
        })
    }
}

/// Drains the engine's stderr on a detached thread, one line per message.
fn spawn_stderr_reader(stderr: Option<ChildStderr>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let Some(stderr) = stderr else {
            return;
        };
        let mut reader = BufReader::new(stderr);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) | Err(_) => return,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw);
                    if tx.send(line.trim_end_matches(['\r', '\n']).to_string()).is_err() {
                        return;
                    }
                }
            }
        }
    });
    rx
}

/// Collects stderr until the pipe closes, or until `deadline` when one is given. The
/// reader thread is left behind once the deadline passes.
fn collect_stderr(lines: &Receiver<String>, deadline: Option<Instant>) -> String {
    let mut collected = Vec::new();
    loop {
        let next = match deadline {
            None => lines.recv().ok(),
            Some(deadline) => lines
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .ok(),
        };
        match next {
            Some(line) => collected.push(line),
            None => break,
        }
    }
    collected.join("\n")
}
