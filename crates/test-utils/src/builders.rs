#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use forkrun::config::{RunConfiguration, WorkerCommand};
use forkrun::fingerprint::Fingerprint;
use tempfile::TempDir;

/// Builder for `RunConfiguration` to simplify test setup.
pub struct RunConfigBuilder {
    config: RunConfiguration,
}

impl RunConfigBuilder {
    /// Start from a configuration spawning `worker_program`.
    pub fn new(worker_program: impl Into<PathBuf>) -> Self {
        Self {
            config: RunConfiguration {
                worker: WorkerCommand::new(worker_program),
                ..RunConfiguration::default()
            },
        }
    }

    /// Spawn something other than the bundled worker.
    pub fn worker(mut self, worker: WorkerCommand) -> Self {
        self.config.worker = worker;
        self
    }

    pub fn require(mut self, module: impl AsRef<Path>) -> Self {
        self.config
            .require
            .push(module.as_ref().display().to_string());
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.config.color = Some(color);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn precompiled(mut self, file: impl Into<PathBuf>, fp: Fingerprint) -> Self {
        self.config.precompiled.insert(file.into(), fp);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> RunConfiguration {
        self.config
    }
}

/// Writes test script fixtures into a temporary directory.
///
/// The directory lives as long as the builder.
pub struct ScriptBuilder {
    dir: TempDir,
    scripts: BTreeMap<String, PathBuf>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("creating fixture directory"),
            scripts: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `body` to `name` (relative to the root) and return its path.
    pub fn script(&mut self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("creating fixture subdirectory");
        }
        std::fs::write(&path, body).expect("writing fixture script");
        self.scripts.insert(name.to_string(), path.clone());
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.scripts
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no fixture named {name}"))
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
