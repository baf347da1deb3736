// src/cache/transform.rs

//! Pluggable source-to-artifact transforms.
//!
//! The cache never compiles anything itself; it asks a [`Transform`] and
//! keys the output by the transform's [`Transform::cache_key`] together with
//! the source bytes.

use std::fmt::Debug;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

pub trait Transform: Send + Sync + Debug {
    /// Bytes describing everything that influences the output.
    ///
    /// Changing presets, plugins or the command line must change this value.
    fn cache_key(&self) -> Vec<u8>;

    /// Extension used for published artifacts.
    fn extension(&self) -> &str;

    /// Compile `source` (read from `path`) into an artifact payload.
    fn transform(&self, path: &Path, source: &[u8]) -> Result<String>;
}

/// Passes the source through unchanged.
#[derive(Debug, Clone)]
pub struct IdentityTransform {
    extension: String,
}

impl IdentityTransform {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl Transform for IdentityTransform {
    fn cache_key(&self) -> Vec<u8> {
        format!("identity|{}", self.extension).into_bytes()
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn transform(&self, path: &Path, source: &[u8]) -> Result<String> {
        String::from_utf8(source.to_vec())
            .with_context(|| format!("source of {:?} is not valid UTF-8", path))
    }
}

/// Runs a shell command with the source on stdin and takes stdout as the
/// artifact. A non-zero exit fails the transform with the command's stderr.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    cmd: String,
    extension: String,
}

impl CommandTransform {
    pub fn new(cmd: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            extension: extension.into(),
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }
}

impl Transform for CommandTransform {
    fn cache_key(&self) -> Vec<u8> {
        format!("command|{}|{}", self.cmd, self.extension).into_bytes()
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn transform(&self, path: &Path, source: &[u8]) -> Result<String> {
        debug!(cmd = %self.cmd, file = ?path, "running transform command");

        let mut child = self
            .shell()
            .env("FORKRUN_SOURCE_FILE", path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning transform command '{}'", self.cmd))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("transform command has no stdin pipe"))?;

        // Feed stdin from a separate thread so a large source cannot deadlock
        // against a full stdout pipe.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(source));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .map_err(|_| anyhow!("transform stdin writer panicked"))?;
            if let Err(e) = written {
                // The command may legitimately stop reading early.
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(anyhow::Error::from(e).context("writing source to transform"));
                }
            }
            output.context("waiting for transform command")
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "transform command '{}' failed ({}): {}",
                self.cmd,
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("transform output for {:?} is not valid UTF-8", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_returns_source() -> Result<()> {
        let t = IdentityTransform::new("fk");
        assert_eq!(t.transform(Path::new("a.fk"), b"pass a\n")?, "pass a\n");
        Ok(())
    }

    #[test]
    fn command_key_changes_with_command() {
        let a = CommandTransform::new("cat", "fk");
        let b = CommandTransform::new("tr a-z A-Z", "fk");
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[cfg(unix)]
    #[test]
    fn command_transform_pipes_source() -> Result<()> {
        let t = CommandTransform::new("tr a-z A-Z", "fk");
        assert_eq!(t.transform(Path::new("a.fk"), b"pass a")?, "PASS A");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn command_transform_failure_carries_stderr() {
        let t = CommandTransform::new("echo 'syntax error' >&2; exit 2", "fk");
        let err = t
            .transform(Path::new("a.fk"), b"pass a")
            .expect_err("transform should fail");
        assert!(err.to_string().contains("syntax error"), "{err}");
    }
}
