use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Incremental reader over a file that another process is appending to.
#[derive(Debug)]
struct TailCursor {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
}

impl TailCursor {
    fn read_available(&mut self, emit: &mut dyn FnMut(String) -> bool) -> io::Result<bool> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err),
        };
        if file.metadata()?.len() < self.offset {
            self.offset = 0;
            self.pending.clear();
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = Vec::new();
        let read = file.read_to_end(&mut chunk)?;
        self.offset += read as u64;
        self.pending.extend_from_slice(&chunk);

        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if !emit(decode_line(&line)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn flush_partial(&mut self, emit: &mut dyn FnMut(String) -> bool) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            emit(decode_line(&rest));
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(['\r', '\n']).to_string()
}

/// Background follower of the engine log. Lines arrive on a channel in the order the
/// engine wrote them; the log may not exist when tailing starts.
pub struct LogTailer {
    stop: Arc<AtomicBool>,
    lines: Receiver<String>,
    handle: Option<JoinHandle<()>>,
}

impl LogTailer {
    pub fn spawn(path: PathBuf, start_offset: u64) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let stop_flag = stop.clone();
        let handle = thread::spawn(move || {
            follow(
                TailCursor {
                    path,
                    offset: start_offset,
                    pending: Vec::new(),
                },
                &stop_flag,
                &tx,
            )
        });
        Self {
            stop,
            lines: rx,
            handle: Some(handle),
        }
    }

    /// Lines discovered so far, without blocking.
    pub fn try_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.lines.try_iter()
    }

    /// Stops following after one last read and returns whatever was still queued,
    /// including an unterminated final line.
    pub fn finish(mut self) -> Vec<String> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.lines.try_iter().collect()
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn follow(mut cursor: TailCursor, stop: &AtomicBool, tx: &Sender<String>) {
    let mut emit = |line: String| tx.send(line).is_ok();
    loop {
        let stopping = stop.load(Ordering::Relaxed);
        match cursor.read_available(&mut emit) {
            Ok(true) => {}
            Ok(false) => return,
            // Transient sharing violations are retried on the next poll.
            Err(_) if !stopping => {}
            Err(_) => return,
        }
        if stopping {
            cursor.flush_partial(&mut emit);
            return;
        }
        thread::sleep(TAIL_POLL_INTERVAL);
    }
}

/// Reads the log from `offset` to its current end, lossily decoded.
pub fn read_from_offset(path: &Path, offset: u64) -> io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    file.seek(SeekFrom::Start(offset.min(len)))?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
