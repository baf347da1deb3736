// src/cache/artifact.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Where the compiled payload of an artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactSource {
    /// Published file inside the cache directory.
    Cached { path: PathBuf },
    /// Payload carried by value (in-memory caches).
    Inline { payload: String },
}

/// A compiled test file, identified by its fingerprint.
///
/// Handed read-only to every worker that runs the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecompiledArtifact {
    pub fingerprint: Fingerprint,
    pub source: ArtifactSource,
}

impl PrecompiledArtifact {
    /// Load the compiled payload, reading the cache file if needed.
    pub fn load(&self) -> std::io::Result<String> {
        self.load_in(None)
    }

    /// Like [`load`](Self::load), resolving a relative cached path against
    /// `cache_dir`.
    pub fn load_in(&self, cache_dir: Option<&Path>) -> std::io::Result<String> {
        match &self.source {
            ArtifactSource::Cached { path } => match cache_dir {
                Some(dir) if path.is_relative() => std::fs::read_to_string(dir.join(path)),
                _ => std::fs::read_to_string(path),
            },
            ArtifactSource::Inline { payload } => Ok(payload.clone()),
        }
    }

    /// Same artifact with its cached path made relative to `cache_dir`.
    ///
    /// Paths outside `cache_dir` and inline payloads are left alone.
    pub fn relative_to(self, cache_dir: &Path) -> Self {
        let source = match self.source {
            ArtifactSource::Cached { path } => match path.strip_prefix(cache_dir) {
                Ok(rel) => ArtifactSource::Cached {
                    path: rel.to_path_buf(),
                },
                Err(_) => ArtifactSource::Cached { path },
            },
            inline => inline,
        };
        Self {
            fingerprint: self.fingerprint,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    #[test]
    fn cached_path_round_trips_through_cache_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fp = fingerprint(b"pass a", b"");
        let path = dir.path().join(format!("{fp}.fk"));
        std::fs::write(&path, "pass a")?;

        let artifact = PrecompiledArtifact {
            fingerprint: fp.clone(),
            source: ArtifactSource::Cached { path },
        }
        .relative_to(dir.path());

        assert_eq!(
            artifact.source,
            ArtifactSource::Cached {
                path: PathBuf::from(format!("{fp}.fk"))
            }
        );
        assert_eq!(artifact.load_in(Some(dir.path()))?, "pass a");
        Ok(())
    }

    #[test]
    fn foreign_paths_stay_absolute() {
        let artifact = PrecompiledArtifact {
            fingerprint: fingerprint(b"", b""),
            source: ArtifactSource::Cached {
                path: PathBuf::from("/elsewhere/a.fk"),
            },
        };
        let moved = artifact.clone().relative_to(Path::new("/cache"));
        assert_eq!(moved, artifact);
    }
}
