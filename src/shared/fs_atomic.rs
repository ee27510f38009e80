use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A sibling temp file that becomes `target` on `commit`. Dropped uncommitted, it is
/// removed, so an interrupted write leaves the previous content in place.
struct StagedFile {
    target: PathBuf,
    staged: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn create(target: &Path) -> io::Result<(Self, File)> {
        let dir = parent_dir(target);
        fs::create_dir_all(dir)?;
        let name = target
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("state");
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let staged = dir.join(format!(".{name}.tmp-{}-{nanos}", std::process::id()));
        let file = OpenOptions::new().create_new(true).write(true).open(&staged)?;
        Ok((
            Self {
                target: target.to_path_buf(),
                staged,
                committed: false,
            },
            file,
        ))
    }

    fn commit(mut self) -> io::Result<()> {
        fs::rename(&self.staged, &self.target)?;
        self.committed = true;
        sync_dir(parent_dir(&self.target))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.staged);
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Replaces `path` with `content` in one rename so readers never observe a partial file.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let (staged, mut file) = StagedFile::create(path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);
    staged.commit()
}

/// Renames `path` to `<name>.<tag>` beside it and returns the new location.
pub fn move_aside(path: &Path, tag: &str) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("state");
    let aside = path.with_file_name(format!("{name}.{tag}"));
    fs::rename(path, &aside)?;
    Ok(aside)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
