// src/manager/core.rs

//! Pure per-run state machine.
//!
//! `RunState` tracks one worker from spawn to settlement without touching
//! processes, channels or Tokio. The async shell in
//! [`supervisor`](super::supervisor) feeds it messages, kill requests and the
//! final exit status; everything the caller observes is decided here.
//!
//! Termination is classified by [`classify`], a decision table evaluated in
//! this order:
//!
//! | kill requested | exit code | signal | results | verdict            |
//! |----------------|-----------|--------|---------|--------------------|
//! | yes            | any       | any    | any     | `KilledByCaller`   |
//! | no             | != 0      | -      | any     | `NonZeroExit`      |
//! | no             | none      | any    | any     | `Crashed`          |
//! | no             | 0         | -      | no      | `MissingResults`   |
//! | no             | 0         | -      | yes     | `Success`          |

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use nix::sys::signal::Signal;

use crate::errors::RunError;
use crate::ipc::{ResultsPayload, StatsSnapshot, TestRecord, WorkerMessage};

use super::{ExitInfo, RunOutcome, RunSummary, WorkerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Spawning,
    Running,
    Terminating,
    Settled,
}

/// Everything the decision table looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub kill_requested: Option<Signal>,
    pub code: Option<i32>,
    /// Raw signal number, including ones `Signal` cannot represent.
    pub signal: Option<i32>,
    pub results_received: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    KilledByCaller(i32),
    NonZeroExit(i32),
    /// No exit code: the process died of a signal, possibly one the
    /// platform did not report.
    Crashed(Option<i32>),
    MissingResults,
    Success,
}

pub fn classify(t: &Termination) -> Verdict {
    if let Some(requested) = t.kill_requested {
        // Name the signal the process actually died of; a worker that
        // exited on its own after the request still reports the request.
        return Verdict::KilledByCaller(t.signal.unwrap_or(requested as i32));
    }
    match t.code {
        Some(code) if code != 0 => Verdict::NonZeroExit(code),
        None => Verdict::Crashed(t.signal),
        _ if !t.results_received => Verdict::MissingResults,
        _ => Verdict::Success,
    }
}

/// `SIGKILL`-style name for a raw signal number; `SIG<n>` when `Signal`
/// has no variant for it (realtime signals).
pub fn signal_name(signo: i32) -> String {
    match Signal::try_from(signo) {
        Ok(signal) => signal.as_str().to_string(),
        Err(_) => format!("SIG{signo}"),
    }
}

#[derive(Debug)]
pub struct RunState {
    file: PathBuf,
    phase: Phase,
    kill_requested: Option<Signal>,
    last_stats: Option<StatsSnapshot>,
    tests: Vec<TestRecord>,
    results: Option<ResultsPayload>,
}

impl RunState {
    /// `file` is the path reported to the caller (relative to the root).
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            phase: Phase::Spawning,
            kill_requested: None,
            last_stats: None,
            tests: Vec::new(),
            results: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn results_received(&self) -> bool {
        self.results.is_some()
    }

    pub fn kill_requested(&self) -> Option<Signal> {
        self.kill_requested
    }

    /// The process is up and its channel attached.
    pub fn start(&mut self) {
        if self.phase == Phase::Spawning {
            self.phase = Phase::Running;
        }
    }

    /// Record an inbound message and return the event to re-emit.
    ///
    /// Messages are ignored outside `Running`.
    pub fn on_message(&mut self, msg: WorkerMessage) -> Option<WorkerEvent> {
        if self.phase != Phase::Running {
            return None;
        }
        let event = match msg {
            WorkerMessage::Test(record) => {
                self.tests.push(record.clone());
                WorkerEvent::Test(record)
            }
            WorkerMessage::Stats(stats) => {
                self.last_stats = Some(stats);
                WorkerEvent::Stats(stats)
            }
            WorkerMessage::Results(payload) => {
                self.last_stats = Some(payload.stats);
                self.results = Some(payload.clone());
                WorkerEvent::Results(payload)
            }
            WorkerMessage::CleanupCompleted { completed } => {
                WorkerEvent::CleanupCompleted { completed }
            }
        };
        Some(event)
    }

    /// Register a caller kill. Returns whether the signal should be sent.
    ///
    /// Only the first requested signal is remembered; later requests are
    /// still delivered while the process runs.
    pub fn request_kill(&mut self, signal: Signal) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.kill_requested.get_or_insert(signal);
        true
    }

    /// The process is gone; produce the final `exit` event.
    pub fn on_exit(&mut self, exit: ExitInfo) -> WorkerEvent {
        self.phase = Phase::Terminating;
        WorkerEvent::Exit(exit)
    }

    /// Compute the outcome. Consumes the state, so a run settles once.
    pub fn settle(mut self, exit: ExitInfo) -> RunOutcome {
        self.phase = Phase::Settled;
        let file = self.file.display().to_string();
        let termination = Termination {
            kill_requested: self.kill_requested,
            code: exit.code,
            signal: exit.signal,
            results_received: self.results.is_some(),
        };

        match classify(&termination) {
            Verdict::KilledByCaller(signo) => Err(RunError::SignalTermination {
                file,
                signal: signal_name(signo),
            }),
            Verdict::Crashed(signo) => Err(RunError::SignalTermination {
                file,
                signal: signo.map_or_else(|| "an unknown signal".to_string(), signal_name),
            }),
            Verdict::NonZeroExit(code) => Err(RunError::NonZeroExit { file, code }),
            Verdict::MissingResults => Err(RunError::MissingResults { file }),
            Verdict::Success => {
                let duration_ms = self.results.as_ref().map_or(0, |r| r.duration_ms);
                Ok(RunSummary {
                    file: self.file,
                    stats: self.last_stats.unwrap_or_default(),
                    tests: self.tests,
                    duration: Duration::from_millis(duration_ms),
                })
            }
        }
    }

    /// Settle without an exit status because the OS could not report one.
    pub fn fail(mut self, source: io::Error) -> RunOutcome {
        self.phase = Phase::Settled;
        Err(RunError::Worker {
            file: self.file.display().to_string(),
            source,
        })
    }
}
