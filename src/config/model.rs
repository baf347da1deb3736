// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cache::{
    CommandTransform, IdentityTransform, PrecompileCache, PrecompiledOverrides, Transform,
};
use crate::fingerprint::Fingerprint;
use crate::logging::LogLevel;

/// Program spawned for a worker when nothing else is configured.
pub const DEFAULT_WORKER_PROGRAM: &str = "forkrun-worker";

/// Artifact extension used when `[transform].extension` is omitted.
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "fk";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [run]
/// require = ["test/helpers/setup.fk"]
/// color = true
/// cache_dir = ".forkrun/cache"
/// worker = ["forkrun-worker"]
///
/// [run.precompiled]
/// "test/a.fk" = "<fingerprint>"
///
/// [transform]
/// cmd = "cat"
/// extension = "fk"
///
/// [log]
/// level = "debug"
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub transform: TransformSection,

    #[serde(default)]
    pub log: LogSection,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Modules preloaded by every worker, in order.
    #[serde(default)]
    pub require: Vec<String>,

    /// Omitted means "let the worker detect it".
    #[serde(default)]
    pub color: Option<bool>,

    /// Where artifacts are published. Without it artifacts stay inline.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Program and arguments used to spawn a worker.
    #[serde(default = "default_worker")]
    pub worker: Vec<String>,

    /// Extra environment for workers.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Fingerprint overrides (`file path = fingerprint`).
    #[serde(default)]
    pub precompiled: BTreeMap<PathBuf, String>,
}

fn default_worker() -> Vec<String> {
    vec![DEFAULT_WORKER_PROGRAM.to_string()]
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            require: Vec::new(),
            color: None,
            cache_dir: None,
            worker: default_worker(),
            env: BTreeMap::new(),
            precompiled: BTreeMap::new(),
        }
    }
}

/// `[transform]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformSection {
    /// Shell command compiling stdin to stdout. `None` passes sources through.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    DEFAULT_ARTIFACT_EXTENSION.to_string()
}

impl Default for TransformSection {
    fn default() -> Self {
        Self {
            cmd: None,
            extension: default_extension(),
        }
    }
}

impl TransformSection {
    pub fn build(&self) -> Arc<dyn Transform> {
        match &self.cmd {
            Some(cmd) => Arc::new(CommandTransform::new(cmd.clone(), self.extension.clone())),
            None => Arc::new(IdentityTransform::new(self.extension.clone())),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSection {
    #[serde(default)]
    pub level: Option<LogLevel>,
}

/// Program plus arguments used to start a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for WorkerCommand {
    fn default() -> Self {
        WorkerCommand::new(DEFAULT_WORKER_PROGRAM)
    }
}

/// Options handed to every worker spawn.
///
/// Built once and then only cloned; nothing mutates it during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfiguration {
    pub precompiled: PrecompiledOverrides,
    pub require: Vec<String>,
    pub color: Option<bool>,
    pub cache_dir: Option<PathBuf>,
    pub worker: WorkerCommand,
    pub env: BTreeMap<String, String>,
}

impl RunConfiguration {
    /// Cache matching this configuration: on disk under `cache_dir`, or
    /// in memory when no directory is configured.
    pub fn precompile_cache(&self, transform: Arc<dyn Transform>) -> PrecompileCache {
        match &self.cache_dir {
            Some(dir) => PrecompileCache::new(dir.clone(), transform),
            None => PrecompileCache::in_memory(transform),
        }
    }
}

impl ConfigFile {
    /// Convert the `[run]` section, resolving a relative `cache_dir`
    /// against `base_dir` (normally the config file's directory).
    pub fn run_configuration(&self, base_dir: &Path) -> Result<RunConfiguration> {
        let mut precompiled = PrecompiledOverrides::new();
        for (file, fp) in self.run.precompiled.iter() {
            let fp: Fingerprint = fp
                .parse()
                .with_context(|| format!("[run.precompiled] entry for {:?}", file))?;
            precompiled.insert(file.clone(), fp);
        }

        let mut parts = self.run.worker.iter();
        let program = parts
            .next()
            .context("[run].worker must name a program")?;
        let worker = WorkerCommand {
            program: PathBuf::from(program),
            args: parts.cloned().collect(),
        };

        Ok(RunConfiguration {
            precompiled,
            require: self.run.require.clone(),
            color: self.run.color,
            cache_dir: self.run.cache_dir.as_ref().map(|dir| base_dir.join(dir)),
            worker,
            env: self.run.env.clone(),
        })
    }
}
