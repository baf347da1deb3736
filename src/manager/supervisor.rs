// src/manager/supervisor.rs

//! Async shell around [`RunState`]: owns the child process and its pipes.
//!
//! Sequencing per run:
//! 1. spawn the worker and write the spawn message to its stdin;
//! 2. re-emit every stdout message until stdout reaches EOF;
//! 3. wait for the exit status (kill requests are honoured throughout);
//! 4. emit `exit`, settle, close the event stream, deliver the outcome.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::PrecompiledArtifact;
use crate::config::RunConfiguration;
use crate::errors::RunError;
use crate::ipc::{SpawnMessage, WorkerMessage, decode_line, encode_line};

use super::core::RunState;
use super::handle::{KillHandle, WorkerHandle};
use super::{ExitInfo, RunOutcome, WorkerEvent};

/// Environment variable the worker reads its colour override from.
pub const FORCE_COLOR_ENV: &str = "FORCE_COLOR";

/// Spawn a worker for `file` and start supervising it.
///
/// `file` is the path as the caller named it (sent to the worker);
/// `relative` is what events and errors report. Must be called from within
/// a Tokio runtime.
pub fn spawn_worker(
    file: PathBuf,
    relative: PathBuf,
    artifact: PrecompiledArtifact,
    config: &RunConfiguration,
) -> Result<WorkerHandle, RunError> {
    let file_label = relative.display().to_string();
    let worker_io = |source: io::Error| RunError::Worker {
        file: file_label.clone(),
        source,
    };

    // The worker resolves cached artifacts against the cache directory.
    let artifact = match &config.cache_dir {
        Some(dir) => artifact.relative_to(dir),
        None => artifact,
    };
    let spawn_msg = SpawnMessage {
        file,
        artifact,
        require: config.require.clone(),
        color: config.color,
        cache_dir: config.cache_dir.clone(),
    };
    let line = encode_line(&spawn_msg).map_err(|e| worker_io(io::Error::other(e)))?;

    let mut cmd = Command::new(&config.worker.program);
    cmd.args(&config.worker.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(color) = config.color {
        cmd.env(FORCE_COLOR_ENV, if color { "1" } else { "0" });
    }

    let mut child = cmd.spawn().map_err(worker_io)?;
    let pid = child.id();

    info!(
        file = %file_label,
        pid = ?pid,
        fingerprint = %spawn_msg.artifact.fingerprint,
        "spawned worker"
    );

    let mut state = RunState::new(relative.clone());

    if let Some(stdin) = child.stdin.take() {
        tokio::spawn(send_spawn_message(stdin, line, file_label.clone()));
    }
    state.start();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (kill_tx, kill_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let settled = Arc::new(AtomicBool::new(false));

    let supervisor = Supervisor {
        child,
        state,
        file_label,
        events_tx,
        kill_rx,
        settled: Arc::clone(&settled),
    };
    tokio::spawn(async move {
        let outcome = supervisor.run().await;
        let _ = outcome_tx.send(outcome);
    });

    Ok(WorkerHandle::new(
        relative,
        pid,
        events_rx,
        outcome_rx,
        KillHandle::new(kill_tx, settled),
    ))
}

/// Write the spawn message and close stdin.
///
/// A worker that exits without reading its input closes the pipe first;
/// that is not an error here, its exit status tells the story.
async fn send_spawn_message(mut stdin: ChildStdin, line: String, file_label: String) {
    let res = async {
        stdin.write_all(line.as_bytes()).await?;
        stdin.shutdown().await
    }
    .await;

    match res {
        Ok(()) => debug!(file = %file_label, "sent spawn message"),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!(file = %file_label, "worker closed stdin before reading spawn message")
        }
        Err(e) => warn!(file = %file_label, error = %e, "failed to send spawn message"),
    }
}

struct Supervisor {
    child: Child,
    state: RunState,
    file_label: String,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    kill_rx: mpsc::UnboundedReceiver<Signal>,
    settled: Arc<AtomicBool>,
}

impl Supervisor {
    async fn run(mut self) -> RunOutcome {
        if let Some(stderr) = self.child.stderr.take() {
            let file_label = self.file_label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(file = %file_label, "stderr: {}", line);
                }
            });
        }

        if let Some(stdout) = self.child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => self.handle_line(&line),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(file = %self.file_label, error = %e, "reading worker stdout failed");
                            break;
                        }
                    },
                    Some(signal) = self.kill_rx.recv() => self.deliver(signal),
                }
            }
        }

        let status = loop {
            tokio::select! {
                status = self.child.wait() => break status,
                Some(signal) = self.kill_rx.recv() => self.deliver(signal),
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                warn!(file = %self.file_label, error = %e, "waiting for worker failed");
                return self.finish(|state| state.fail(e));
            }
        };

        let exit = ExitInfo {
            code: status.code(),
            signal: status.signal(),
        };
        info!(
            file = %self.file_label,
            exit_code = ?exit.code,
            signal = ?exit.signal,
            "worker exited"
        );

        let event = self.state.on_exit(exit);
        let _ = self.events_tx.send(event);
        self.finish(|state| state.settle(exit))
    }

    fn handle_line(&mut self, line: &str) {
        match decode_line::<WorkerMessage>(line) {
            Ok(Some(msg)) => {
                debug!(file = %self.file_label, kind = msg.kind(), "worker message");
                if let Some(event) = self.state.on_message(msg) {
                    // The receiver may be gone; the run still has to settle.
                    let _ = self.events_tx.send(event);
                }
            }
            Ok(None) => debug!(file = %self.file_label, "stdout: {}", line),
            Err(e) => warn!(file = %self.file_label, error = %e, "ignoring malformed worker message"),
        }
    }

    fn deliver(&mut self, signal: Signal) {
        if !self.state.request_kill(signal) {
            return;
        }
        let Some(pid) = self.child.id() else {
            debug!(file = %self.file_label, "worker already reaped; nothing to kill");
            return;
        };
        info!(file = %self.file_label, pid, signal = signal.as_str(), "killing worker");
        if let Err(e) = signal::kill(Pid::from_raw(pid as i32), signal) {
            warn!(file = %self.file_label, error = %e, "failed to signal worker");
        }
    }

    /// Settle, then close the event stream.
    fn finish(self, settle: impl FnOnce(RunState) -> RunOutcome) -> RunOutcome {
        let Supervisor {
            state,
            settled,
            events_tx,
            ..
        } = self;
        let outcome = settle(state);
        settled.store(true, Ordering::SeqCst);
        drop(events_tx);
        outcome
    }
}
