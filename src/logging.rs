//! Logging setup.
//!
//! The wizard owns the terminal, so tracing output goes to a per-launch log
//! file only. The filter comes from `STMGRAPH_LOG` (default `info`). Old log
//! files are pruned to a bounded count.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

pub const LOG_ENV_VAR: &str = "STMGRAPH_LOG";
const DEFAULT_FILTER: &str = "info";
const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "stmgraph";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("No suitable data directory available for logs")]
    NoDataDir,

    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Per-user application folder: `<data dir>/stmgraph`.
pub fn app_data_dir() -> Result<PathBuf, LoggingError> {
    dirs::data_local_dir()
        .map(|dir| dir.join("stmgraph"))
        .ok_or(LoggingError::NoDataDir)
}

/// Default log folder: `<data dir>/stmgraph/logs`.
pub fn default_log_dir() -> Result<PathBuf, LoggingError> {
    Ok(app_data_dir()?.join("logs"))
}

/// Install the global subscriber writing to `log_file`, or to a timestamped
/// file in [`default_log_dir`] when none is given.
///
/// Keep the returned guard alive for the whole run; dropping it flushes and
/// closes the writer.
pub fn init(log_file: Option<&Path>) -> Result<(WorkerGuard, PathBuf), LoggingError> {
    let log_path = match log_file {
        Some(path) => path.to_path_buf(),
        None => {
            let dir = default_log_dir()?;
            dir.join(format!(
                "{LOG_FILE_PREFIX}-{}.log",
                Local::now().format("%Y%m%d-%H%M%S")
            ))
        }
    };
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| format!("{LOG_FILE_PREFIX}.log").into());

    fs::create_dir_all(&log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.clone(),
        source,
    })?;
    ensure_file_exists(&log_path)?;
    if log_file.is_none() {
        prune_old_logs(&log_dir, MAX_LOG_FILES)?;
    }

    let (writer, guard) = tracing_appender::non_blocking(rolling::never(&log_dir, file_name));
    let file_layer = fmt::layer().with_ansi(false).with_writer(writer);

    let subscriber = Registry::default().with(build_env_filter()).with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), log = %log_path.display(), "Logging initialized");
    Ok((guard, log_path))
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn ensure_file_exists(path: &Path) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Remove the oldest `stmgraph-*.log` files beyond `max_files`.
fn prune_old_logs(dir: &Path, max_files: usize) -> Result<(), LoggingError> {
    let mut entries: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir)
        .map_err(|source| LoggingError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("log")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();

    entries.sort_by_key(|(modified, _)| *modified);
    let excess = entries.len().saturating_sub(max_files);
    for (_, path) in entries.into_iter().take(excess) {
        // A locked or vanished file only costs disk space.
        if let Err(e) = fs::remove_file(&path) {
            tracing::debug!(path = %path.display(), error = %e, "Could not prune log file");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for i in 0..4 {
            fs::write(dir.path().join(format!("stmgraph-{i}.log")), "x").unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        fs::write(dir.path().join("other.log"), "x").unwrap();

        prune_old_logs(dir.path(), 2).unwrap();

        assert!(!dir.path().join("stmgraph-0.log").exists());
        assert!(!dir.path().join("stmgraph-1.log").exists());
        assert!(dir.path().join("stmgraph-2.log").exists());
        assert!(dir.path().join("stmgraph-3.log").exists());
        assert!(dir.path().join("other.log").exists());
    }
}
