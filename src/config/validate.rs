// src/config/validate.rs

use crate::config::model::ConfigFile;
use crate::errors::{ForkrunError, Result};
use crate::fingerprint::Fingerprint;

/// Semantic checks on a loaded configuration:
///
/// - `[run].worker` names a program
/// - every `[run.precompiled]` value is a well-formed fingerprint
/// - `[transform].extension` is a plain, non-empty suffix
/// - `[run].cache_dir` is not an existing regular file
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_worker(cfg)?;
    validate_precompiled(cfg)?;
    validate_transform(cfg)?;
    validate_cache_dir(cfg)?;
    Ok(())
}

fn validate_worker(cfg: &ConfigFile) -> Result<()> {
    match cfg.run.worker.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(ForkrunError::ConfigError(
            "[run].worker must name a program to spawn".to_string(),
        )),
    }
}

fn validate_precompiled(cfg: &ConfigFile) -> Result<()> {
    for (file, fp) in cfg.run.precompiled.iter() {
        if let Err(e) = fp.parse::<Fingerprint>() {
            return Err(ForkrunError::ConfigError(format!(
                "[run.precompiled] entry for {:?}: {e}",
                file
            )));
        }
    }
    Ok(())
}

fn validate_transform(cfg: &ConfigFile) -> Result<()> {
    let ext = &cfg.transform.extension;
    if ext.is_empty() || ext.contains(['/', '\\', '.']) {
        return Err(ForkrunError::ConfigError(format!(
            "[transform].extension must be a plain suffix like \"fk\" (got {ext:?})"
        )));
    }
    if let Some(cmd) = &cfg.transform.cmd {
        if cmd.trim().is_empty() {
            return Err(ForkrunError::ConfigError(
                "[transform].cmd must not be empty when given".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_cache_dir(cfg: &ConfigFile) -> Result<()> {
    if let Some(dir) = &cfg.run.cache_dir {
        if dir.is_file() {
            return Err(ForkrunError::ConfigError(format!(
                "[run].cache_dir {:?} exists and is not a directory",
                dir
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ConfigFile::default()).is_ok());
    }

    #[test]
    fn cache_dir_pointing_at_a_file_is_rejected() -> anyhow::Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let mut cfg = ConfigFile::default();
        cfg.run.cache_dir = Some(file.path().to_path_buf());

        let err = validate_config(&cfg).expect_err("cache_dir is a file");
        assert!(matches!(err, ForkrunError::ConfigError(_)));
        Ok(())
    }
}
