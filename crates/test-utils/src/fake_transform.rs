use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use forkrun::cache::Transform;
use tracing::debug;

/// A transform that:
/// - passes sources through unchanged
/// - counts how many times it actually ran.
#[derive(Debug, Default)]
pub struct CountingTransform {
    calls: AtomicUsize,
}

impl CountingTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transform for CountingTransform {
    fn cache_key(&self) -> Vec<u8> {
        b"counting".to_vec()
    }

    fn extension(&self) -> &str {
        "fk"
    }

    fn transform(&self, path: &Path, source: &[u8]) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(file = ?path, calls = n, "counting transform ran");
        Ok(String::from_utf8_lossy(source).into_owned())
    }
}

/// A transform that always fails with a fixed message.
#[derive(Debug)]
pub struct FailingTransform {
    message: String,
}

impl FailingTransform {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Transform for FailingTransform {
    fn cache_key(&self) -> Vec<u8> {
        b"failing".to_vec()
    }

    fn extension(&self) -> &str {
        "fk"
    }

    fn transform(&self, _path: &Path, _source: &[u8]) -> Result<String> {
        Err(anyhow!("{}", self.message))
    }
}
