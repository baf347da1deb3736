// src/cache/store.rs

//! On-disk artifact store.
//!
//! Artifacts live at `<cache_dir>/<fingerprint>.<ext>`. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! reader either sees a complete artifact or none at all. Two writers racing
//! on the same fingerprint publish identical bytes; the last rename wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::CacheError;
use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.{}", fingerprint, self.extension))
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.artifact_path(fingerprint).is_file()
    }

    /// Atomically publish `payload` under `fingerprint`.
    pub fn publish(&self, fingerprint: &Fingerprint, payload: &str) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let target = self.artifact_path(fingerprint);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        tmp.write_all(payload.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| CacheError::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;

        tmp.persist(&target).map_err(|e| CacheError::Io {
            path: target.clone(),
            source: e.error,
        })?;

        debug!(fingerprint = %fingerprint, path = ?target, "published artifact");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    #[test]
    fn publish_then_contains() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(dir.path().join("cache"), "fk");
        let fp = fingerprint(b"pass a", b"");

        assert!(!store.contains(&fp));
        let path = store.publish(&fp, "pass a\n")?;

        assert!(store.contains(&fp));
        assert_eq!(path, store.artifact_path(&fp));
        assert_eq!(fs::read_to_string(path)?, "pass a\n");
        Ok(())
    }

    #[test]
    fn republish_overwrites_without_leftovers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(dir.path(), "fk");
        let fp = fingerprint(b"pass a", b"");

        store.publish(&fp, "first")?;
        store.publish(&fp, "second")?;

        assert_eq!(fs::read_to_string(store.artifact_path(&fp))?, "second");
        let entries = fs::read_dir(dir.path())?.count();
        assert_eq!(entries, 1, "temporary files must not be left behind");
        Ok(())
    }
}
