// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::model::{ConfigFile, RunConfiguration};
use crate::config::validate::validate_config;

/// Load a configuration file and deserialize it.
///
/// This does **not** validate; use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file and run validation on it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)
        .with_context(|| format!("validating config {:?}", path.as_ref()))?;
    Ok(config)
}

/// Load, validate and convert a configuration file.
///
/// Relative paths inside the file (such as `cache_dir`) are resolved
/// against the file's directory.
pub fn load_run_configuration(path: impl AsRef<Path>) -> Result<(ConfigFile, RunConfiguration)> {
    let path = path.as_ref();
    let config = load_and_validate(path)?;
    let run = config.run_configuration(&config_root_dir(path))?;
    Ok((config, run))
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Forkrun.toml")
}

/// Directory relative paths in a config file are resolved against.
///
/// A bare file name (parent `""`) falls back to the current directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|e| {
            warn!(
                error = %e,
                "current directory unavailable; resolving config paths against \".\""
            );
            PathBuf::from(".")
        }),
    }
}
