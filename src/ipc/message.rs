// src/ipc/message.rs

//! Message types exchanged between the manager and a worker.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::PrecompiledArtifact;

/// First and only parent → worker message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnMessage {
    /// Test file as the caller named it.
    pub file: PathBuf,
    pub artifact: PrecompiledArtifact,
    /// Modules to preload, in order, before the artifact runs.
    #[serde(default)]
    pub require: Vec<String>,
    /// `None` leaves colour detection to the worker.
    #[serde(default)]
    pub color: Option<bool>,
    /// A relative cached artifact path is resolved against this.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// One completed test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub title: String,
    pub status: TestStatus,
    /// Wall-clock duration in milliseconds, measured by the worker.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestRecord {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Running pass/fail/skip counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub pass_count: u32,
    pub fail_count: u32,
    pub skip_count: u32,
}

impl StatsSnapshot {
    pub fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.pass_count += 1,
            TestStatus::Failed => self.fail_count += 1,
            TestStatus::Skipped => self.skip_count += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.pass_count + self.fail_count + self.skip_count
    }
}

/// Terminal success message of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsPayload {
    pub tests: Vec<TestRecord>,
    pub stats: StatsSnapshot,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

/// Worker → parent messages, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerMessage {
    Test(TestRecord),
    Stats(StatsSnapshot),
    Results(ResultsPayload),
    CleanupCompleted { completed: bool },
}

impl WorkerMessage {
    /// Protocol name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerMessage::Test(_) => "test",
            WorkerMessage::Stats(_) => "stats",
            WorkerMessage::Results(_) => "results",
            WorkerMessage::CleanupCompleted { .. } => "cleanup-completed",
        }
    }
}
