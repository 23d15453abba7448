//! Subprocess bridge to the Python `stm_graph` library.
//!
//! One bridge process is started on first use and kept for the life of the
//! [`PythonBridge`], so the library objects behind [`Handle`](super::Handle)s
//! survive from one call to the next. Requests and replies are single JSON
//! lines:
//!
//! ```text
//! -> {"id": 3, "op": "build_graph", "request": {...}}
//! <- {"id": 3, "ok": true, "result": {...}}
//! <- {"id": 3, "ok": false, "error": "message"}
//! ```
//!
//! Non-JSON lines on stdout are treated as library chatter and logged.
//! Stderr is forwarded to the log. If the process dies, the next call starts
//! a fresh one; handles from the old process are then unknown to it.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    DatasetRequest, FeatureTable, GraphData, GraphRequest, GraphToolkit, LoadDatasetRequest,
    MappingOutput, MappingRequest, ModelHandle, ModelRequest, OsmFeatureRequest, PlotRequest,
    PreprocessRequest, ProcessedData, TemporalDataset, TrainRequest, TrainingReport,
};

/// Bridge server shipped with the binary.
pub const BRIDGE_SCRIPT: &str = include_str!("../../python/stm_graph_bridge.py");
pub const BRIDGE_SCRIPT_NAME: &str = "stm_graph_bridge.py";
pub const DEFAULT_PYTHON: &str = "python3";

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge command is empty")]
    EmptyCommand,

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to install the bridge script to {path}: {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error talking to the bridge: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode {operation} request: {source}")]
    Encode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation}: bridge exited with {status} without a reply{stderr}")]
    NoReply {
        operation: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{operation}: malformed reply: {source}")]
    Malformed {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} failed: {message}")]
    Remote { operation: String, message: String },
}

impl BridgeError {
    /// Whether the bridge process can no longer be trusted after this error.
    fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Io(_) | BridgeError::NoReply { .. })
    }
}

#[derive(Serialize)]
struct Message<'a, Req> {
    id: u64,
    op: &'a str,
    request: &'a Req,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Read stdout lines until the reply to `id` arrives.
///
/// Returns `Ok(None)` when the stream ends first.
pub fn read_reply<R: BufRead>(
    reader: &mut R,
    operation: &str,
    id: u64,
) -> Result<Option<Value>, BridgeError> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
            debug!(operation, output = text, "Toolkit output");
            continue;
        };
        if envelope.id != Some(id) {
            warn!(operation, expected = id, got = ?envelope.id, "Skipping stale bridge reply");
            continue;
        }
        if !envelope.ok {
            return Err(BridgeError::Remote {
                operation: operation.to_string(),
                message: envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        return Ok(Some(envelope.result));
    }
}

/// Write the bundled bridge script into `dir`, rewriting it only when it changed.
pub fn install_script(dir: &Path) -> Result<PathBuf, BridgeError> {
    let path = dir.join(BRIDGE_SCRIPT_NAME);
    let install_error = |source| BridgeError::Install {
        path: path.clone(),
        source,
    };
    if fs::read_to_string(&path).ok().as_deref() != Some(BRIDGE_SCRIPT) {
        fs::create_dir_all(dir).map_err(install_error)?;
        fs::write(&path, BRIDGE_SCRIPT).map_err(install_error)?;
        info!(path = %path.display(), "Installed bridge script");
    }
    Ok(path)
}

struct BridgeProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    stderr_reader: JoinHandle<()>,
    next_id: u64,
}

impl BridgeProcess {
    fn exchange(&mut self, operation: &str, id: u64, line: &str) -> Result<Value, BridgeError> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;

        match read_reply(&mut self.stdout, operation, id)? {
            Some(result) => Ok(result),
            None => {
                // Stdout closed: the process is gone or about to be.
                let _ = self.child.kill();
                let status = self.child.wait()?;
                Err(BridgeError::NoReply {
                    operation: operation.to_string(),
                    status,
                    stderr: self.last_stderr_line(),
                })
            }
        }
    }

    fn last_stderr_line(&self) -> String {
        let deadline = Instant::now() + Duration::from_millis(200);
        while !self.stderr_reader.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let tail = self.stderr_tail.lock().unwrap_or_else(PoisonError::into_inner);
        tail.back().map(|l| format!(": {l}")).unwrap_or_default()
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Long-lived connection to the bridge server. Calls are serialized.
pub struct PythonBridge {
    program: String,
    args: Vec<String>,
    process: Mutex<Option<BridgeProcess>>,
}

impl PythonBridge {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            process: Mutex::new(None),
        }
    }

    /// Build from a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self, BridgeError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(BridgeError::EmptyCommand)?;
        Ok(Self::new(program, parts.collect()))
    }

    /// Run the bundled script with `python`, installing it under `dir`.
    pub fn bundled(python: &str, dir: &Path) -> Result<Self, BridgeError> {
        let script = install_script(dir)?;
        Ok(Self::new(
            python,
            vec![script.to_string_lossy().into_owned()],
        ))
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether a bridge process is currently running.
    pub fn is_connected(&self) -> bool {
        self.process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn spawn(&self) -> Result<BridgeProcess, BridgeError> {
        info!(command = %self.command_line(), "Starting toolkit bridge");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let missing = || io::Error::other("bridge pipe was not captured");
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        let stderr = child.stderr.take().ok_or_else(missing)?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let sink = Arc::clone(&stderr_tail);
        let stderr_reader = thread::Builder::new()
            .name("stmgraph-bridge-stderr".to_string())
            .spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!(target: "stmgraph::bridge", "{line}");
                    let mut tail = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })?;

        Ok(BridgeProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_tail,
            stderr_reader,
            next_id: 1,
        })
    }

    fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, BridgeError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let mut slot = self.process.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(self.spawn()?);
        }
        let Some(process) = slot.as_mut() else {
            return Err(io::Error::other("bridge process unavailable").into());
        };

        let id = process.next_id;
        process.next_id += 1;
        let line = serde_json::to_string(&Message {
            id,
            op: operation,
            request,
        })
        .map_err(|source| BridgeError::Encode {
            operation: operation.to_string(),
            source,
        })?;

        debug!(operation, id, bytes = line.len(), "Calling toolkit bridge");
        let result = match process.exchange(operation, id, &line) {
            Ok(result) => result,
            Err(err) => {
                if err.is_fatal() {
                    warn!(operation, error = %err, "Toolkit bridge lost");
                    *slot = None;
                }
                return Err(err);
            }
        };
        info!(operation, id, "Toolkit bridge returned");

        serde_json::from_value(result).map_err(|source| BridgeError::Malformed {
            operation: operation.to_string(),
            source,
        })
    }
}

impl GraphToolkit for PythonBridge {
    fn preprocess(&self, request: &PreprocessRequest) -> Result<ProcessedData> {
        Ok(self.call("preprocess", request)?)
    }

    fn create_mapping(&self, request: &MappingRequest) -> Result<MappingOutput> {
        Ok(self.call("create_mapping", request)?)
    }

    fn extract_osm_features(&self, request: &OsmFeatureRequest) -> Result<FeatureTable> {
        Ok(self.call("extract_osm_features", request)?)
    }

    fn build_graph(&self, request: &GraphRequest) -> Result<GraphData> {
        Ok(self.call("build_graph", request)?)
    }

    fn create_temporal_dataset(&self, request: &DatasetRequest) -> Result<TemporalDataset> {
        Ok(self.call("create_temporal_dataset", request)?)
    }

    fn load_temporal_dataset(&self, request: &LoadDatasetRequest) -> Result<TemporalDataset> {
        Ok(self.call("load_temporal_dataset", request)?)
    }

    fn plot(&self, request: &PlotRequest) -> Result<PathBuf> {
        Ok(self.call("plot", request)?)
    }

    fn create_model(&self, request: &ModelRequest) -> Result<ModelHandle> {
        Ok(self.call("create_model", request)?)
    }

    fn train(&self, request: &TrainRequest) -> Result<TrainingReport> {
        Ok(self.call("train", request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_command_line_split() {
        let bridge = PythonBridge::from_command_line("python3 bridge.py --verbose").unwrap();
        assert_eq!(bridge.command_line(), "python3 bridge.py --verbose");
        assert!(!bridge.is_connected());
        assert!(matches!(
            PythonBridge::from_command_line("   "),
            Err(BridgeError::EmptyCommand)
        ));
    }

    #[test]
    fn test_reply_skips_library_chatter() {
        let mut stdout = Cursor::new(
            "Processing 1200 rows...\n\n{\"id\": 4, \"ok\": true, \"result\": {\"num_nodes\": 12}}\n",
        );
        let value = read_reply(&mut stdout, "build_graph", 4).unwrap().unwrap();
        assert_eq!(value["num_nodes"], 12);
    }

    #[test]
    fn test_stale_reply_is_skipped() {
        let mut stdout = Cursor::new(
            "{\"id\": 1, \"ok\": true, \"result\": \"old\"}\n{\"id\": 2, \"ok\": true, \"result\": \"new\"}\n",
        );
        let value = read_reply(&mut stdout, "plot", 2).unwrap().unwrap();
        assert_eq!(value, "new");
    }

    #[test]
    fn test_remote_error_is_reported() {
        let mut stdout = Cursor::new(r#"{"id": 1, "ok": false, "error": "column 'lat' not found"}"#);
        let err = read_reply(&mut stdout, "preprocess", 1).unwrap_err();
        assert_eq!(err.to_string(), "preprocess failed: column 'lat' not found");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_end_of_stream_has_no_reply() {
        let mut stdout = Cursor::new("starting up\n");
        assert!(read_reply(&mut stdout, "train", 1).unwrap().is_none());
    }

    #[test]
    fn test_install_script_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = install_script(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(BRIDGE_SCRIPT_NAME));
        assert_eq!(fs::read_to_string(&path).unwrap(), BRIDGE_SCRIPT);

        fs::write(&path, "stale").unwrap();
        install_script(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), BRIDGE_SCRIPT);
    }

    #[test]
    fn test_bundled_runs_script_with_python() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = PythonBridge::bundled("python3", dir.path()).unwrap();
        assert_eq!(
            bridge.command_line(),
            format!("python3 {}", dir.path().join(BRIDGE_SCRIPT_NAME).display())
        );
    }
}
