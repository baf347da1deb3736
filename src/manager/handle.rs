// src/manager/handle.rs

//! Caller-facing side of a run.

use std::future::{Future, IntoFuture};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::Signal;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::errors::RunError;

use super::{RunOutcome, WorkerEvent};

/// Cloneable way to kill a running worker.
///
/// Killing a settled run is a no-op.
#[derive(Debug, Clone)]
pub struct KillHandle {
    tx: mpsc::UnboundedSender<Signal>,
    settled: Arc<AtomicBool>,
}

impl KillHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Signal>, settled: Arc<AtomicBool>) -> Self {
        Self { tx, settled }
    }

    pub fn kill(&self, signal: Signal) {
        if self.is_settled() {
            debug!(signal = signal.as_str(), "kill requested after settlement; ignoring");
            return;
        }
        // The supervisor may settle between the check and the send; a
        // closed channel means exactly that.
        let _ = self.tx.send(signal);
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }
}

/// One spawned worker: an ordered event stream plus a single outcome.
///
/// Events arrive in the order the worker sent them and end with
/// [`WorkerEvent::Exit`]; after that the stream is closed. Awaiting the
/// handle (or calling [`WorkerHandle::wait`]) yields the outcome.
#[derive(Debug)]
pub struct WorkerHandle {
    file: PathBuf,
    pid: Option<u32>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    outcome: oneshot::Receiver<RunOutcome>,
    killer: KillHandle,
}

impl WorkerHandle {
    pub(crate) fn new(
        file: PathBuf,
        pid: Option<u32>,
        events: mpsc::UnboundedReceiver<WorkerEvent>,
        outcome: oneshot::Receiver<RunOutcome>,
        killer: KillHandle,
    ) -> Self {
        Self {
            file,
            pid,
            events,
            outcome,
            killer,
        }
    }

    /// Test file, relative to the runner root.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// OS process id, if the platform reported one at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next event, or `None` once the run has settled.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    pub fn kill(&self, signal: Signal) {
        self.killer.kill(signal);
    }

    pub fn kill_handle(&self) -> KillHandle {
        self.killer.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.killer.is_settled()
    }

    /// Wait for the outcome. Unread events are discarded.
    pub async fn wait(self) -> RunOutcome {
        let file = self.file.display().to_string();
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RunError::Worker {
                file,
                source: io::Error::other("worker supervisor stopped before settling"),
            }),
        }
    }

    /// Drain every event, then wait for the outcome.
    pub async fn collect(mut self) -> (Vec<WorkerEvent>, RunOutcome) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let outcome = self.wait().await;
        (events, outcome)
    }
}

impl IntoFuture for WorkerHandle {
    type Output = RunOutcome;
    type IntoFuture = Pin<Box<dyn Future<Output = RunOutcome> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
