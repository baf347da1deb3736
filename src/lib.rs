// src/lib.rs

//! Process-isolated test execution.
//!
//! - [`fingerprint`]: content fingerprints for test sources.
//! - [`cache`]: content-addressed precompilation cache.
//! - [`ipc`]: newline-delimited JSON protocol between parent and worker.
//! - [`manager`]: spawns one worker per test file and settles its outcome.
//! - [`worker`]: the runtime inside a worker process.
//! - [`config`]: `Forkrun.toml` loading and validation.
//!
//! Workers are supervised with POSIX signals, so the crate targets Unix.

pub mod cache;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod ipc;
pub mod logging;
pub mod manager;
pub mod worker;

pub use cache::{PrecompileCache, PrecompiledArtifact, Transform};
pub use config::{RunConfiguration, WorkerCommand};
pub use errors::{CacheError, RunError};
pub use fingerprint::Fingerprint;
pub use manager::{
    ExitInfo, KillHandle, RunOutcome, RunSummary, Runner, Signal, WorkerEvent, WorkerHandle,
};
