// src/manager/mod.rs

//! Worker process manager.
//!
//! [`Runner::run`] precompiles a test file through the shared
//! [`PrecompileCache`], spawns one worker process for it and returns a
//! [`WorkerHandle`]. The handle yields the worker's messages as
//! [`WorkerEvent`]s in arrival order, then a final [`WorkerEvent::Exit`],
//! and settles exactly once to a [`RunOutcome`].
//!
//! - [`core`] is the pure per-run state machine and exit classification.
//! - [`supervisor`] is the async shell that owns the child process.
//! - [`handle`] is what callers hold on to.

pub mod core;
pub mod handle;
pub mod path_utils;
pub mod supervisor;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::PrecompileCache;
use crate::config::RunConfiguration;
use crate::errors::RunError;
use crate::ipc::{ResultsPayload, StatsSnapshot, TestRecord};

pub use handle::{KillHandle, WorkerHandle};
pub use nix::sys::signal::Signal;

/// How the worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Raw signal number; realtime signals have no `Signal` variant.
    pub signal: Option<i32>,
}

/// Events observed on a [`WorkerHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Test(TestRecord),
    Stats(StatsSnapshot),
    Results(ResultsPayload),
    CleanupCompleted { completed: bool },
    /// Synthesized by the manager once all messages have been drained.
    Exit(ExitInfo),
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Test(_) => "test",
            WorkerEvent::Stats(_) => "stats",
            WorkerEvent::Results(_) => "results",
            WorkerEvent::CleanupCompleted { .. } => "cleanup-completed",
            WorkerEvent::Exit(_) => "exit",
        }
    }
}

/// Successful settlement of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Test file relative to the runner root.
    pub file: PathBuf,
    pub stats: StatsSnapshot,
    pub tests: Vec<TestRecord>,
    /// Total duration as measured by the worker.
    pub duration: Duration,
}

pub type RunOutcome = Result<RunSummary, RunError>;

/// Entry point for running test files in isolated workers.
///
/// Cheap to clone; clones share the same cache.
#[derive(Debug, Clone)]
pub struct Runner {
    cache: Arc<PrecompileCache>,
    root: PathBuf,
}

impl Runner {
    /// Runner reporting paths relative to the current directory.
    pub fn new(cache: Arc<PrecompileCache>) -> Self {
        let root = std::env::current_dir().unwrap_or_else(|e| {
            warn!(
                error = %e,
                "current directory unavailable; reporting paths relative to \".\""
            );
            PathBuf::from(".")
        });
        Self { cache, root }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &Arc<PrecompileCache> {
        &self.cache
    }

    /// Precompile `file` and spawn a worker for it.
    ///
    /// A compilation failure is returned here and no process is spawned.
    pub async fn run(
        &self,
        file: impl AsRef<Path>,
        config: &RunConfiguration,
    ) -> Result<WorkerHandle, RunError> {
        let file = file.as_ref().to_path_buf();
        let relative = path_utils::relative_to(&self.root, &file);
        let file_label = relative.display().to_string();

        let cache = Arc::clone(&self.cache);
        let overrides = config.precompiled.clone();
        let target = file.clone();
        let resolved = tokio::task::spawn_blocking(move || cache.resolve(&target, &overrides))
            .await
            .map_err(|e| RunError::Worker {
                file: file_label.clone(),
                source: io::Error::other(e),
            })?;

        let artifact = resolved.map_err(|source| RunError::Compilation {
            file: file_label.clone(),
            source,
        })?;
        debug!(file = %file_label, fingerprint = %artifact.fingerprint, "artifact resolved");

        supervisor::spawn_worker(file, relative, artifact, config)
    }
}
