// src/worker/session.rs

//! Worker side of the protocol.
//!
//! A session emits `stats` as soon as it is announced, one `test` plus one
//! `stats` per finished test, then `results`, and finally
//! `cleanup-completed` once every piece of deferred work has finished.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::ipc::{
    MessageWriter, ResultsPayload, StatsSnapshot, TestRecord, TestStatus, WorkerMessage,
};

use super::clock::{Clock, Stopwatch, SystemClock};

pub struct WorkerSession<W: Write> {
    file: PathBuf,
    writer: MessageWriter<W>,
    clock: Arc<dyn Clock>,
    color: bool,
    stats: StatsSnapshot,
    tests: Vec<TestRecord>,
    pending: JoinSet<()>,
    started: Stopwatch,
}

impl<W: Write> WorkerSession<W> {
    /// `file` is the test file being run, used for diagnostics only.
    pub fn new(file: impl Into<PathBuf>, output: W, color: bool) -> Self {
        Self {
            file: file.into(),
            writer: MessageWriter::new(output),
            clock: Arc::new(SystemClock),
            color,
            stats: StatsSnapshot::default(),
            tests: Vec::new(),
            pending: JoinSet::new(),
            started: Stopwatch::start(),
        }
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    /// The clock test code sees.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Replace the clock test code sees. Durations are unaffected.
    pub fn install_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats
    }

    /// Emit the initial stats snapshot.
    ///
    /// Must happen before anything that could end the process abruptly, so
    /// the parent always has a chance to intervene.
    pub fn announce(&mut self) -> Result<()> {
        self.writer.send(&WorkerMessage::Stats(self.stats))
    }

    /// Run one test body and report it. `Err` from the body fails the test.
    pub fn run_test<F>(&mut self, title: impl Into<String>, body: F) -> Result<()>
    where
        F: FnOnce(&dyn Clock) -> std::result::Result<(), String>,
    {
        let clock = self.clock();
        let watch = Stopwatch::start();
        let result = body(clock.as_ref());
        let duration_ms = watch.elapsed_ms();

        let (status, error) = match result {
            Ok(()) => (TestStatus::Passed, None),
            Err(message) => (TestStatus::Failed, Some(message)),
        };
        self.record(TestRecord {
            title: title.into(),
            status,
            duration_ms,
            error,
        })
    }

    pub fn skip(&mut self, title: impl Into<String>) -> Result<()> {
        self.record(TestRecord {
            title: title.into(),
            status: TestStatus::Skipped,
            duration_ms: 0,
            error: None,
        })
    }

    /// Track work the process must not exit before.
    pub fn defer<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.spawn(work);
    }

    fn record(&mut self, record: TestRecord) -> Result<()> {
        self.stats.record(record.status);
        debug!(
            file = ?self.file,
            title = %record.title,
            status = ?record.status,
            total = self.stats.total(),
            "test finished"
        );
        self.writer.send(&WorkerMessage::Test(record.clone()))?;
        self.tests.push(record);
        self.writer.send(&WorkerMessage::Stats(self.stats))
    }

    /// Report results, wait for deferred work, report cleanup.
    pub async fn finish(mut self) -> Result<W> {
        let results = ResultsPayload {
            tests: std::mem::take(&mut self.tests),
            stats: self.stats,
            duration_ms: self.started.elapsed_ms(),
        };
        self.writer.send(&WorkerMessage::Results(results))?;

        while let Some(joined) = self.pending.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "deferred work did not complete");
            }
        }

        self.writer
            .send(&WorkerMessage::CleanupCompleted { completed: true })?;
        Ok(self.writer.into_inner())
    }
}
