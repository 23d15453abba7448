//! Background task dispatch.
//!
//! A [`Dispatcher`] runs closures on named threads and hands their results
//! back to the thread that polls it. Each spawn gets a [`Ticket`]; exactly one
//! [`Completion`] is delivered per live ticket. Errors returned by the closure
//! and panics inside it both arrive as [`TaskError`] values.

pub mod log_tail;

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

pub use log_tail::{LogFileWatcher, LogPrinter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("a {0} task is already running")]
    AlreadyRunning(String),

    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct Completion<K, T> {
    pub kind: K,
    pub ticket: Ticket,
    pub result: Result<T, TaskError>,
}

struct Live {
    ticket: Ticket,
    handle: JoinHandle<()>,
}

pub struct Dispatcher<K, T> {
    tx: Sender<Completion<K, T>>,
    rx: Receiver<Completion<K, T>>,
    live: HashMap<K, Live>,
    next_ticket: u64,
}

impl<K, T> Default for Dispatcher<K, T>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Dispatcher<K, T>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
    T: Send + 'static,
{
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            live: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Start `task` unless a task of the same kind is still in flight.
    pub fn spawn<F>(&mut self, kind: K, task: F) -> Result<Ticket, DispatchError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        if self.live.contains_key(&kind) {
            return Err(DispatchError::AlreadyRunning(format!("{kind:?}")));
        }
        self.start(kind, task)
    }

    /// Detach any in-flight task of this kind, then start `task`.
    ///
    /// The detached worker keeps running to completion but its result is
    /// dropped when it arrives.
    pub fn supersede<F>(&mut self, kind: K, task: F) -> Result<Ticket, DispatchError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        if let Some(old) = self.live.remove(&kind) {
            debug!(?kind, ticket = old.ticket.0, "Detaching superseded worker");
        }
        self.start(kind, task)
    }

    fn start<F>(&mut self, kind: K, task: F) -> Result<Ticket, DispatchError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        let tx = self.tx.clone();
        let name = format!("stmgraph-{kind:?}").to_lowercase();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let result = match panic::catch_unwind(AssertUnwindSafe(task)) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(TaskError::Failed(format!("{e:#}"))),
                    Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
                };
                // The dispatcher may be gone when the UI shuts down mid-task.
                let _ = tx.send(Completion {
                    kind,
                    ticket,
                    result,
                });
            })
            .map_err(DispatchError::Spawn)?;

        debug!(?kind, ticket = ticket.0, "Worker started");
        self.live.insert(kind, Live { ticket, handle });
        Ok(ticket)
    }

    /// Drain finished tasks without blocking, in completion order.
    pub fn poll(&mut self) -> Vec<Completion<K, T>> {
        let mut done = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if self.accept(&completion) {
                done.push(completion);
            }
        }
        done
    }

    /// Block until the next live completion or until `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<Completion<K, T>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) if self.accept(&completion) => return Some(completion),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    pub fn is_running(&self, kind: K) -> bool {
        self.live.contains_key(&kind)
    }

    pub fn is_idle(&self) -> bool {
        self.live.is_empty()
    }

    fn accept(&mut self, completion: &Completion<K, T>) -> bool {
        match self.live.remove(&completion.kind) {
            Some(live) if live.ticket == completion.ticket => {
                if live.handle.join().is_err() {
                    warn!(kind = ?completion.kind, "Worker thread ended abnormally");
                }
                true
            }
            Some(live) => {
                debug!(kind = ?completion.kind, ticket = completion.ticket.0, "Dropping stale completion");
                self.live.insert(completion.kind, live);
                false
            }
            None => {
                debug!(kind = ?completion.kind, ticket = completion.ticket.0, "Dropping stale completion");
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extracts_str_and_string() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }

    #[test]
    fn test_tickets_are_unique() {
        let mut dispatcher: Dispatcher<u8, ()> = Dispatcher::new();
        let a = dispatcher.spawn(1, || Ok(())).unwrap();
        let b = dispatcher.spawn(2, || Ok(())).unwrap();
        assert_ne!(a, b);
    }
}
