use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The six summary columns the engine prints for `Dirs :` and `Files :`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total: u64,
    pub copied: u64,
    pub skipped: u64,
    pub mismatch: u64,
    pub failed: u64,
    pub extra: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStats {
    pub dirs: Counters,
    pub files: Counters,
    /// Copied size exactly as reported, unit suffix included (`5.1g`, `1048576`).
    pub copied_bytes: String,
}

impl Default for ReportStats {
    fn default() -> Self {
        Self {
            dirs: Counters::default(),
            files: Counters::default(),
            copied_bytes: "0".to_string(),
        }
    }
}

// Patterns are compiled once. A pattern that failed to compile simply never matches,
// which keeps the parser total.
fn counters_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?m)^\s*(Dirs|Files)\s*:\s*(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s*$",
            )
            .ok()
        })
        .as_ref()
}

fn bytes_line_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?m)^\s*Bytes\s*:(.*)$").ok())
        .as_ref()
}

fn size_token_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)(?:\s*([kmgtKMGT])\b)?|(-)").ok())
        .as_ref()
}

/// Extracts summary statistics from raw engine output. Never fails: anything missing or
/// malformed leaves the matching counter at zero. When the text holds several summary
/// blocks the last one wins.
pub fn parse_report(text: &str) -> ReportStats {
    let mut stats = ReportStats::default();

    let Some(counters_re) = counters_pattern() else {
        return stats;
    };
    for caps in counters_re.captures_iter(text) {
        let column = |index: usize| {
            caps.get(index)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        let counters = Counters {
            total: column(2),
            copied: column(3),
            skipped: column(4),
            mismatch: column(5),
            failed: column(6),
            extra: column(7),
        };
        match caps.get(1).map(|m| m.as_str()) {
            Some("Dirs") => stats.dirs = counters,
            Some("Files") => stats.files = counters,
            _ => {}
        }
    }

    if let Some(line) = bytes_line_pattern()
        .and_then(|re| re.captures_iter(text).last())
        .and_then(|caps| caps.get(1))
    {
        stats.copied_bytes = copied_size_token(line.as_str()).unwrap_or_else(|| "0".to_string());
    }

    stats
}

/// The second size column of a `Bytes :` line is the copied figure. A `-` placeholder or
/// a short line yields `None`.
fn copied_size_token(columns: &str) -> Option<String> {
    let caps = size_token_pattern()?.captures_iter(columns).nth(1)?;
    let number = caps.get(1)?.as_str();
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    Some(format!("{number}{unit}"))
}
