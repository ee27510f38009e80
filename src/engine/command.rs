use crate::config::MigrationConfig;
use crate::engine::topology::{strip_trailing_separators, PathTopology};
use crate::migration::Phase;
use std::path::{Path, PathBuf};

/// One discrete engine argument. Kept typed until the process boundary so the argument
/// list can be inspected and compared without spawning anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineArg {
    Path(String),
    Switch(&'static str),
    Valued { flag: &'static str, value: String },
    List { flag: &'static str, values: Vec<String> },
    Log { path: PathBuf, append: bool },
    Custom(String),
}

impl EngineArg {
    fn render(&self, quote: bool, out: &mut Vec<String>) {
        let maybe_quote = |value: &str| {
            if quote {
                quote_if_needed(value)
            } else {
                value.to_string()
            }
        };
        match self {
            EngineArg::Path(path) => out.push(maybe_quote(strip_trailing_separators(path))),
            EngineArg::Switch(flag) => out.push((*flag).to_string()),
            EngineArg::Valued { flag, value } => out.push(format!("{flag}:{value}")),
            EngineArg::List { flag, values } => {
                out.push((*flag).to_string());
                out.extend(values.iter().map(|value| maybe_quote(value)));
            }
            EngineArg::Log { path, append } => {
                let flag = if *append { "/LOG+" } else { "/LOG" };
                out.push(format!("{flag}:{}", maybe_quote(&path.display().to_string())));
            }
            EngineArg::Custom(token) => out.push(maybe_quote(token)),
        }
    }
}

fn quote_if_needed(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Restartable, falling back to backup semantics on access denial (`/ZB`).
    Backup,
    Restartable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub path: PathBuf,
    pub append: bool,
}

/// Everything the builder needs besides the static config.
#[derive(Debug, Clone)]
pub struct CommandSpec<'a> {
    pub phase: Phase,
    pub source: &'a str,
    pub destination: &'a str,
    pub topology: PathTopology,
    pub dry_run: bool,
    pub copy_mode: CopyMode,
    pub custom_options: &'a str,
    pub log: LogTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub binary: String,
    pub args: Vec<EngineArg>,
    pub log: LogTarget,
}

impl EngineInvocation {
    /// Tokens handed to the process launcher. The launcher performs its own platform
    /// quoting, so paths are passed bare.
    pub fn to_tokens(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() + 4);
        for arg in &self.args {
            arg.render(false, &mut out);
        }
        out
    }

    /// Human-readable command line with whitespace-bearing paths quoted, as the engine
    /// would see it typed at a console.
    pub fn command_line(&self) -> String {
        let mut out = vec![quote_if_needed(&self.binary)];
        for arg in &self.args {
            arg.render(true, &mut out);
        }
        out.join(" ")
    }

    pub fn log_path(&self) -> &Path {
        &self.log.path
    }

    pub fn contains_switch(&self, flag: &str) -> bool {
        self.args
            .iter()
            .any(|arg| matches!(arg, EngineArg::Switch(f) if *f == flag))
    }
}

/// Builds the ordered engine argument list for one run. Pure: identical inputs give
/// identical output.
pub fn build_command(spec: &CommandSpec<'_>, config: &MigrationConfig) -> EngineInvocation {
    let retry = config.retry.for_topology(spec.topology);
    let mirror = spec.phase == Phase::Mirror;

    let mut args = vec![
        EngineArg::Path(spec.source.to_string()),
        EngineArg::Path(spec.destination.to_string()),
        EngineArg::Switch("/E"),
        EngineArg::Valued {
            flag: "/R",
            value: retry.retry_count.to_string(),
        },
        EngineArg::Valued {
            flag: "/W",
            value: retry.wait_seconds.to_string(),
        },
        EngineArg::Switch("/FFT"),
        EngineArg::Switch("/FP"),
        EngineArg::Switch("/XJ"),
        EngineArg::Valued {
            flag: "/MT",
            value: config.threads.to_string(),
        },
        EngineArg::Switch("/BYTES"),
        EngineArg::Switch("/V"),
        EngineArg::Switch("/NP"),
    ];

    if !mirror {
        args.push(EngineArg::Valued {
            flag: "/COPY",
            value: if config.preserve_acls { "DATS" } else { "DAT" }.to_string(),
        });
    }
    args.push(EngineArg::Switch(match spec.copy_mode {
        CopyMode::Backup => "/ZB",
        CopyMode::Restartable => "/Z",
    }));

    if config.throttle_ipg_ms > 0 {
        args.push(EngineArg::Valued {
            flag: "/IPG",
            value: config.throttle_ipg_ms.to_string(),
        });
    }
    if !config.exclude_dirs.is_empty() {
        args.push(EngineArg::List {
            flag: "/XD",
            values: config.exclude_dirs.clone(),
        });
    }
    if !config.exclude_files.is_empty() {
        args.push(EngineArg::List {
            flag: "/XF",
            values: config.exclude_files.clone(),
        });
    }
    args.extend(
        split_options(spec.custom_options)
            .into_iter()
            .map(EngineArg::Custom),
    );
    if spec.dry_run {
        args.push(EngineArg::Switch("/L"));
    }
    if mirror {
        args.push(EngineArg::Switch("/MIR"));
        args.push(EngineArg::Switch("/COPYALL"));
    }
    args.push(EngineArg::Log {
        path: spec.log.path.clone(),
        append: spec.log.append,
    });
    args.push(EngineArg::Switch("/TEE"));

    EngineInvocation {
        binary: config.engine_binary.clone(),
        args,
        log: spec.log.clone(),
    }
}

/// Splits a free-form option string into engine tokens. Double quotes group words and
/// are dropped; backslashes are path separators, never escapes.
fn split_options(options: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    for ch in options.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}
