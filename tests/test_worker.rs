//! Tests for task dispatch and training log tailing

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use stmgraph::worker::{DispatchError, Dispatcher, LogFileWatcher, LogPrinter, TaskError};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Job {
    Fast,
    Slow,
}

/// Collect printer lines until `count` have arrived or the timeout passes.
fn collect_lines(printer: &LogPrinter, count: usize) -> Vec<String> {
    let deadline = Instant::now() + TIMEOUT;
    let mut lines = Vec::new();
    while lines.len() < count && Instant::now() < deadline {
        lines.extend(printer.drain());
        thread::sleep(Duration::from_millis(10));
    }
    lines
}

// ============================================================================
// Dispatcher
// ============================================================================

#[test]
fn test_completion_delivered_once() {
    let mut dispatcher: Dispatcher<Job, u32> = Dispatcher::new();
    dispatcher.spawn(Job::Fast, || Ok(7)).unwrap();
    assert!(dispatcher.is_running(Job::Fast));

    let completion = dispatcher.wait(TIMEOUT).unwrap();
    assert_eq!(completion.kind, Job::Fast);
    assert_eq!(completion.result, Ok(7));
    assert!(dispatcher.is_idle());
    assert!(dispatcher.poll().is_empty());
    assert!(dispatcher.wait(Duration::from_millis(50)).is_none());
}

#[test]
fn test_one_task_per_kind() {
    let (release, gate) = mpsc::channel::<()>();
    let mut dispatcher: Dispatcher<Job, ()> = Dispatcher::new();
    dispatcher
        .spawn(Job::Slow, move || {
            let _ = gate.recv_timeout(TIMEOUT);
            Ok(())
        })
        .unwrap();

    let err = dispatcher.spawn(Job::Slow, || Ok(())).unwrap_err();
    assert!(matches!(err, DispatchError::AlreadyRunning(_)));
    // Other kinds run alongside.
    dispatcher.spawn(Job::Fast, || Ok(())).unwrap();

    release.send(()).unwrap();
    let mut kinds = vec![
        dispatcher.wait(TIMEOUT).unwrap().kind,
        dispatcher.wait(TIMEOUT).unwrap().kind,
    ];
    kinds.sort_by_key(|k| *k as u8);
    assert_eq!(kinds, vec![Job::Fast, Job::Slow]);
    assert!(dispatcher.is_idle());
}

#[test]
fn test_errors_and_panics_are_captured() {
    let mut dispatcher: Dispatcher<Job, ()> = Dispatcher::new();
    dispatcher.spawn(Job::Fast, || bail!("no data")).unwrap();
    let completion = dispatcher.wait(TIMEOUT).unwrap();
    assert_eq!(
        completion.result,
        Err(TaskError::Failed("no data".to_string()))
    );

    dispatcher
        .spawn(Job::Slow, || -> anyhow::Result<()> { panic!("worker blew up") })
        .unwrap();
    let completion = dispatcher.wait(TIMEOUT).unwrap();
    assert_eq!(
        completion.result,
        Err(TaskError::Panicked("worker blew up".to_string()))
    );
    assert!(dispatcher.is_idle());
}

#[test]
fn test_superseded_result_is_dropped() {
    let (release, gate) = mpsc::channel::<()>();
    let mut dispatcher: Dispatcher<Job, &'static str> = Dispatcher::new();
    let old = dispatcher
        .spawn(Job::Slow, move || {
            let _ = gate.recv_timeout(TIMEOUT);
            Ok("old")
        })
        .unwrap();
    let new = dispatcher.supersede(Job::Slow, || Ok("new")).unwrap();
    assert_ne!(old, new);

    let completion = dispatcher.wait(TIMEOUT).unwrap();
    assert_eq!(completion.ticket, new);
    assert_eq!(completion.result, Ok("new"));

    // The detached worker finishes later and is ignored.
    release.send(()).unwrap();
    assert!(dispatcher.wait(Duration::from_millis(200)).is_none());
    assert!(dispatcher.is_idle());
}

// ============================================================================
// Log watcher and printer
// ============================================================================

#[test]
fn test_watcher_reports_log_once_it_appears() {
    let dir = TempDir::new().unwrap();
    let mut watcher = LogFileWatcher::start(dir.path(), Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(watcher.try_found().is_none());
    assert!(watcher.is_running());

    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    fs::write(dir.path().join("run.log"), "start\n").unwrap();

    let deadline = Instant::now() + TIMEOUT;
    let found = loop {
        if let Some(path) = watcher.try_found() {
            break Some(path);
        }
        if Instant::now() >= deadline {
            break None;
        }
        thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(found, Some(dir.path().join("run.log")));
    watcher.stop();
    assert!(!watcher.is_running());
}

#[test]
fn test_watcher_stops_without_finding() {
    let dir = TempDir::new().unwrap();
    let mut watcher = LogFileWatcher::start(dir.path(), Duration::from_secs(60)).unwrap();
    let started = Instant::now();
    watcher.stop();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(watcher.try_found().is_none());
}

#[test]
fn test_printer_follows_appended_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("train.log");
    fs::write(&path, "epoch 1\n").unwrap();

    let mut printer = LogPrinter::start_with_interval(&path, Duration::from_millis(10)).unwrap();
    assert_eq!(printer.path(), path.as_path());
    assert_eq!(collect_lines(&printer, 1), vec!["epoch 1"]);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    write!(file, "epoch 2\r\nepo").unwrap();
    file.flush().unwrap();
    thread::sleep(Duration::from_millis(50));
    writeln!(file, "ch 3").unwrap();
    file.flush().unwrap();

    // Partial lines are held back until their newline arrives.
    assert_eq!(collect_lines(&printer, 2), vec!["epoch 2", "epoch 3"]);

    printer.stop();
    assert!(!printer.is_running());
}

#[test]
fn test_printer_reports_missing_file() {
    let dir = TempDir::new().unwrap();
    let printer =
        LogPrinter::start_with_interval(dir.path().join("gone.log"), Duration::from_millis(10))
            .unwrap();
    let lines = collect_lines(&printer, 1);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[Error tailing file:"));
}

#[test]
fn test_printer_flushes_last_line_on_stop() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("train.log");
    fs::write(&path, "epoch 1\n").unwrap();

    let mut printer = LogPrinter::start_with_interval(&path, Duration::from_millis(10)).unwrap();
    assert_eq!(collect_lines(&printer, 1), vec!["epoch 1"]);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    write!(file, "Training complete").unwrap();
    file.flush().unwrap();
    printer.stop();

    assert_eq!(printer.drain(), vec!["Training complete"]);
}
