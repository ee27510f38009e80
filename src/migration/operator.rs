use std::path::Path;

/// The human at the console: answers confirmation prompts and reads progress.
pub trait Operator {
    /// `false` covers both an explicit "no" and an abstention.
    fn confirm(&self, prompt: &str) -> bool;
    fn show_line(&self, line: &str);
    fn warn(&self, message: &str);
}

/// Reachability check for network-addressed endpoints before a run starts.
pub trait PathProbe {
    fn is_reachable(&self, path: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsPathProbe;

impl PathProbe for FsPathProbe {
    fn is_reachable(&self, path: &str) -> bool {
        Path::new(path).try_exists().unwrap_or(false)
    }
}
