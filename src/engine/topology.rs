use serde::{Deserialize, Serialize};

/// Whether a path is attached locally or reached over the network. Derived from the
/// path text alone; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathTopology {
    Local,
    Network,
}

impl PathTopology {
    /// UNC-style prefixes (`\\server\share`, `//server/share`) are network-addressed.
    /// Extended-length local prefixes (`\\?\C:\`, `\\.\`) are not.
    pub fn classify(path: &str) -> Self {
        let trimmed = path.trim();
        if let Some(rest) = trimmed.strip_prefix("\\\\") {
            if let Some(unc) = rest.strip_prefix("?\\UNC\\") {
                return if unc.is_empty() { Self::Local } else { Self::Network };
            }
            if rest.starts_with("?\\") || rest.starts_with(".\\") {
                return Self::Local;
            }
            return Self::Network;
        }
        if trimmed.starts_with("//") {
            return Self::Network;
        }
        Self::Local
    }

    /// A copy between two endpoints uses the network budget if either end is remote.
    pub fn of_pair(source: &str, destination: &str) -> Self {
        if Self::classify(source) == Self::Network || Self::classify(destination) == Self::Network
        {
            Self::Network
        } else {
            Self::Local
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Network => "network",
        }
    }
}

impl std::fmt::Display for PathTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_separator(ch: char) -> bool {
    ch == '\\' || ch == '/'
}

/// Drops trailing separators so a quoted path never ends in `\"`. Roots keep their
/// separator (`C:\`, `/`) because removing it changes what they name.
pub fn strip_trailing_separators(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        return if path.is_empty() { path } else { &path[..1] };
    }
    if is_drive_spec(trimmed) {
        return &path[..trimmed.len() + usize::from(path.len() > trimmed.len())];
    }
    trimmed
}

fn is_drive_spec(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// The volume a local path lives on: `C:\` for drive paths, `/` for POSIX paths.
/// Network paths have no snapshot-capable volume and yield `None`.
pub fn volume_root(path: &str) -> Option<String> {
    if PathTopology::classify(path) == PathTopology::Network {
        return None;
    }
    let trimmed = path.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Some(format!("{}\\", trimmed[..2].to_ascii_uppercase()));
    }
    if trimmed.starts_with('/') {
        return Some("/".to_string());
    }
    None
}

/// Moves `path` from beneath `volume` to the same relative location beneath
/// `snapshot_root`, using the snapshot root's separator style.
pub fn rebase_onto(path: &str, volume: &str, snapshot_root: &str) -> Option<String> {
    let trimmed = path.trim();
    let volume_prefix = volume.trim_end_matches(is_separator);
    trimmed
        .get(..volume_prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(volume_prefix))?;
    let relative = trimmed[volume_prefix.len()..].trim_matches(is_separator);
    let separator = if snapshot_root.contains('\\') { '\\' } else { '/' };
    let root = snapshot_root.trim_end_matches(is_separator);
    if relative.is_empty() {
        return Some(format!("{root}{separator}"));
    }
    let relative: String = relative
        .chars()
        .map(|ch| if is_separator(ch) { separator } else { ch })
        .collect();
    Some(format!("{root}{separator}{relative}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_unc_and_forward_slash_shares() {
        assert_eq!(PathTopology::classify("\\\\nas01\\finance"), PathTopology::Network);
        assert_eq!(PathTopology::classify("//nas01/finance"), PathTopology::Network);
        assert_eq!(
            PathTopology::classify("\\\\?\\UNC\\nas01\\finance"),
            PathTopology::Network
        );
        assert_eq!(PathTopology::classify("\\\\?\\C:\\data"), PathTopology::Local);
        assert_eq!(PathTopology::classify("D:\\Shares"), PathTopology::Local);
        assert_eq!(PathTopology::classify("/srv/data"), PathTopology::Local);
    }

    #[test]
    fn pair_is_network_when_either_side_is_remote() {
        assert_eq!(
            PathTopology::of_pair("D:\\Shares", "\\\\nas01\\finance"),
            PathTopology::Network
        );
        assert_eq!(PathTopology::of_pair("D:\\a", "E:\\b"), PathTopology::Local);
    }

    #[test]
    fn trailing_separators_are_stripped_but_roots_survive() {
        assert_eq!(strip_trailing_separators("D:\\Shares\\Finance\\"), "D:\\Shares\\Finance");
        assert_eq!(strip_trailing_separators("\\\\nas01\\finance\\\\"), "\\\\nas01\\finance");
        assert_eq!(strip_trailing_separators("C:\\"), "C:\\");
        assert_eq!(strip_trailing_separators("C:"), "C:");
        assert_eq!(strip_trailing_separators("/"), "/");
        assert_eq!(strip_trailing_separators("/srv/data/"), "/srv/data");
    }

    #[test]
    fn volume_root_and_rebase_preserve_relative_path() {
        let volume = volume_root("d:\\Shares\\Finance").expect("volume");
        assert_eq!(volume, "D:\\");
        let rebased = rebase_onto(
            "d:\\Shares\\Finance",
            &volume,
            "\\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy7\\",
        )
        .expect("rebase");
        assert_eq!(
            rebased,
            "\\\\?\\GLOBALROOT\\Device\\HarddiskVolumeShadowCopy7\\Shares\\Finance"
        );

        assert_eq!(volume_root("\\\\nas01\\finance"), None);
        assert_eq!(
            rebase_onto("/srv/data/projects", "/", "/mnt/snap-1").as_deref(),
            Some("/mnt/snap-1/srv/data/projects")
        );
        assert_eq!(rebase_onto("E:\\other", "D:\\", "/mnt/snap"), None);
    }
}
