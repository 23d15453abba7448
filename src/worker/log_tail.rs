//! Training log discovery and tailing.
//!
//! The training library creates its log file some time after training starts.
//! [`LogFileWatcher`] polls a folder until a log file appears and reports the
//! newest one once. [`LogPrinter`] then streams that file line by line.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(2);
pub const PRINTER_POLL_INTERVAL: Duration = Duration::from_millis(200);
const STOP_CHECK_SLICE: Duration = Duration::from_millis(25);

/// Most recently modified file in `folder` with the given extension.
///
/// A missing or unreadable folder yields `None`.
pub fn newest_with_extension(folder: &Path, extension: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(folder).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

/// Sleep for `total`, waking early once `running` is cleared.
fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let mut slept = Duration::ZERO;
    while slept < total && running.load(Ordering::SeqCst) {
        let step = STOP_CHECK_SLICE.min(total - slept);
        thread::sleep(step);
        slept += step;
    }
}

// ============================================================================
// Watcher
// ============================================================================

pub struct LogFileWatcher {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    found: Receiver<PathBuf>,
}

impl LogFileWatcher {
    pub fn start(folder: impl Into<PathBuf>, interval: Duration) -> io::Result<Self> {
        Self::start_with_extension(folder, "log", interval)
    }

    pub fn start_with_extension(
        folder: impl Into<PathBuf>,
        extension: &str,
        interval: Duration,
    ) -> io::Result<Self> {
        let folder = folder.into();
        let extension = extension.to_string();
        let running = Arc::new(AtomicBool::new(true));
        let (tx, found) = channel();

        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("stmgraph-log-watcher".to_string())
            .spawn(move || {
                debug!(folder = %folder.display(), "Watching for log files");
                while flag.load(Ordering::SeqCst) {
                    if let Some(path) = newest_with_extension(&folder, &extension) {
                        info!(log = %path.display(), "Log file found");
                        let _ = tx.send(path);
                        break;
                    }
                    sleep_while_running(&flag, interval);
                }
                flag.store(false, Ordering::SeqCst);
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
            found,
        })
    }

    /// The discovered log file, delivered at most once.
    pub fn try_found(&self) -> Option<PathBuf> {
        self.found.try_recv().ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop polling and wait for the watcher thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Log watcher thread panicked");
            }
        }
    }
}

impl Drop for LogFileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Printer
// ============================================================================

pub struct LogPrinter {
    path: PathBuf,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    lines: Receiver<String>,
}

impl LogPrinter {
    pub fn start(path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::start_with_interval(path, PRINTER_POLL_INTERVAL)
    }

    pub fn start_with_interval(path: impl Into<PathBuf>, interval: Duration) -> io::Result<Self> {
        let path = path.into();
        let running = Arc::new(AtomicBool::new(true));
        let (tx, lines) = channel();

        let flag = Arc::clone(&running);
        let target = path.clone();
        let handle = thread::Builder::new()
            .name("stmgraph-log-printer".to_string())
            .spawn(move || {
                if let Err(e) = tail(&target, &flag, &tx, interval) {
                    warn!(log = %target.display(), error = %e, "Log tailing failed");
                    let _ = tx.send(format!("[Error tailing file: {e}]"));
                }
            })?;

        Ok(Self {
            path,
            running,
            handle: Some(handle),
            lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines received since the last drain.
    pub fn drain(&self) -> Vec<String> {
        self.lines.try_iter().collect()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop tailing and wait for the printer thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Log printer thread panicked");
            }
        }
    }
}

impl Drop for LogPrinter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tail(
    path: &Path,
    running: &AtomicBool,
    tx: &Sender<String>,
    interval: Duration,
) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut pending = String::new();

    while running.load(Ordering::SeqCst) {
        let mut chunk = String::new();
        if reader.read_line(&mut chunk)? == 0 {
            sleep_while_running(running, interval);
            continue;
        }

        pending.push_str(&chunk);
        if !pending.ends_with('\n') {
            continue;
        }

        let line = pending.trim_end_matches(['\n', '\r']).to_string();
        pending.clear();
        if tx.send(line).is_err() {
            return Ok(());
        }
    }

    // Flush what was written before the stop, including a last line with no newline.
    reader.read_to_string(&mut pending)?;
    for line in pending.lines() {
        if tx.send(line.to_string()).is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_newest_ignores_other_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert!(newest_with_extension(dir.path(), "log").is_none());

        fs::write(dir.path().join("train.log"), "x").unwrap();
        assert_eq!(
            newest_with_extension(dir.path(), "log"),
            Some(dir.path().join("train.log"))
        );
    }

    #[test]
    fn test_newest_on_missing_folder() {
        assert!(newest_with_extension(Path::new("/definitely/not/here"), "log").is_none());
    }
}
