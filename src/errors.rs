// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ForkrunError`] covers semantic configuration failures.
//! - [`CacheError`] is what the precompilation cache reports.
//! - [`ProtocolError`] is what the IPC codec reports.
//! - [`ScriptError`] is what the worker reports for a malformed test script.
//! - [`RunError`] is the settlement of a failed run; every variant carries a
//!   stable [`RunError::name`] tag.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForkrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ForkrunError>;

/// Failures of the precompilation cache.
///
/// A failed transform never leaves a partial entry behind: the artifact is
/// only published after the transform returned successfully.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("transform failed for {path:?}: {source}")]
    Transform {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("cache I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures of the newline-delimited JSON codec.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed worker message {line:?}: {source}")]
    Decode {
        line: String,
        source: serde_json::Error,
    },

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A test script line the worker cannot interpret. Lines are 1-based.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    #[error("line {line}: unknown directive {directive:?}")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: {directive} {reason}")]
    InvalidArgument {
        line: usize,
        directive: &'static str,
        reason: String,
    },
}

/// Terminal failure of a single run.
///
/// `file` is always the path relative to the runner's root, formatted for
/// display, so messages read the same regardless of where the caller lives.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{file} could not be precompiled: {source}")]
    Compilation {
        file: String,
        #[source]
        source: CacheError,
    },

    #[error("{file} exited with a non-zero exit code: {code}")]
    NonZeroExit { file: String, code: i32 },

    #[error("Test results were not received from {file}")]
    MissingResults { file: String },

    #[error("{file} exited due to {signal}")]
    SignalTermination { file: String, signal: String },

    #[error("worker for {file} failed: {source}")]
    Worker {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    /// Stable tag identifying the kind of failure.
    pub fn name(&self) -> &'static str {
        match self {
            RunError::Compilation { .. } => "CompilationError",
            RunError::NonZeroExit { .. } => "NonZeroExitError",
            RunError::MissingResults { .. } => "MissingResultsError",
            RunError::SignalTermination { .. } => "SignalTerminationError",
            RunError::Worker { .. } => "WorkerIoError",
        }
    }

    /// Display form of the file the run was for.
    pub fn file(&self) -> &str {
        match self {
            RunError::Compilation { file, .. }
            | RunError::NonZeroExit { file, .. }
            | RunError::MissingResults { file }
            | RunError::SignalTermination { file, .. }
            | RunError::Worker { file, .. } => file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_messages_name_the_file() {
        let err = RunError::NonZeroExit {
            file: "test/fixture/immediate-3-exit.fk".to_string(),
            code: 3,
        };
        assert_eq!(
            err.to_string(),
            "test/fixture/immediate-3-exit.fk exited with a non-zero exit code: 3"
        );
        assert_eq!(err.name(), "NonZeroExitError");

        let err = RunError::MissingResults {
            file: "a.fk".to_string(),
        };
        assert_eq!(err.to_string(), "Test results were not received from a.fk");
        assert_eq!(err.name(), "MissingResultsError");

        let err = RunError::SignalTermination {
            file: "a.fk".to_string(),
            signal: "SIGKILL".to_string(),
        };
        assert_eq!(err.to_string(), "a.fk exited due to SIGKILL");
        assert_eq!(err.file(), "a.fk");
    }

    #[test]
    fn compilation_error_keeps_the_cause() {
        let err = RunError::Compilation {
            file: "a.fk".to_string(),
            source: CacheError::Transform {
                path: PathBuf::from("a.fk"),
                source: anyhow::anyhow!("unexpected token"),
            },
        };
        assert_eq!(err.name(), "CompilationError");
        let cause = std::error::Error::source(&err).map(|e| e.to_string());
        assert!(cause.unwrap_or_default().contains("unexpected token"));
    }
}
