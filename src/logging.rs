// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. an explicit [`LogLevel`] (e.g. from `[log].level`)
//! 2. `FORKRUN_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs always go to STDERR: in a worker, stdout is the IPC channel.

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing_subscriber::fmt;

use crate::config::LogSection;

pub const LOG_ENV_VAR: &str = "FORKRUN_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Initialise the global logging subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let level = match level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Initialise logging from a `[log]` section.
pub fn init_logging_from_config(log: &LogSection) -> Result<()> {
    init_logging(log.level)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_level_reaches_the_subscriber() {
        let log = LogSection {
            level: Some(LogLevel::Warn),
        };
        assert!(init_logging_from_config(&log).is_ok());
        assert_eq!(
            tracing::level_filters::LevelFilter::current(),
            tracing::level_filters::LevelFilter::WARN
        );
        // Only one global subscriber per process.
        assert!(init_logging_from_config(&log).is_err());
    }

    #[test]
    fn parses_level_names_loosely() {
        assert_eq!(parse_level_str(" Debug "), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(tracing::Level::WARN));
        assert_eq!(parse_level_str("loud"), None);
    }
}
