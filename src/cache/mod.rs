// src/cache/mod.rs

//! Content-addressed precompilation cache.
//!
//! [`PrecompileCache::resolve`] turns a test file into a
//! [`PrecompiledArtifact`]:
//!
//! 1. a caller-supplied fingerprint override skips hashing entirely;
//! 2. otherwise the file is read and fingerprinted together with the
//!    transform's cache key;
//! 3. a fingerprint already in the in-memory map or on disk is reused;
//! 4. anything else is transformed and published atomically.
//!
//! One cache is meant to be shared (behind an `Arc`) by every run. Concurrent
//! first-time resolves of the same file may both transform; publishing is
//! atomic per fingerprint, so the outcome is the same either way.

pub mod artifact;
pub mod store;
pub mod transform;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::errors::CacheError;
use crate::fingerprint::{Fingerprint, fingerprint};

pub use artifact::{ArtifactSource, PrecompiledArtifact};
pub use store::ArtifactStore;
pub use transform::{CommandTransform, IdentityTransform, Transform};

/// Fingerprint overrides keyed by file path, as passed in `precompiled`.
pub type PrecompiledOverrides = BTreeMap<PathBuf, Fingerprint>;

#[derive(Debug)]
pub struct PrecompileCache {
    transform: Arc<dyn Transform>,
    cache_key: Vec<u8>,
    store: Option<ArtifactStore>,
    known: Mutex<HashMap<Fingerprint, ArtifactSource>>,
}

impl PrecompileCache {
    /// Cache that publishes artifacts under `dir`.
    pub fn new(dir: impl Into<PathBuf>, transform: Arc<dyn Transform>) -> Self {
        let store = ArtifactStore::new(dir, transform.extension());
        Self::build(transform, Some(store))
    }

    /// Cache that keeps artifacts inline and never touches the disk.
    pub fn in_memory(transform: Arc<dyn Transform>) -> Self {
        Self::build(transform, None)
    }

    fn build(transform: Arc<dyn Transform>, store: Option<ArtifactStore>) -> Self {
        let cache_key = transform.cache_key();
        Self {
            transform,
            cache_key,
            store,
            known: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.store.as_ref().map(ArtifactStore::dir)
    }

    /// Resolve `path` to an artifact, compiling it if necessary.
    pub fn resolve(
        &self,
        path: &Path,
        overrides: &PrecompiledOverrides,
    ) -> Result<PrecompiledArtifact, CacheError> {
        if let Some(fp) = overrides.get(path) {
            if let Some(artifact) = self.from_override(fp) {
                debug!(file = ?path, fingerprint = %fp, "using precompiled override");
                return Ok(artifact);
            }
            debug!(
                file = ?path,
                fingerprint = %fp,
                "override unusable without a cache directory; recompiling"
            );
        }

        let source = std::fs::read(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fp = fingerprint(&source, &self.cache_key);

        if let Some(artifact) = self.lookup(&fp) {
            debug!(file = ?path, fingerprint = %fp, "precompile cache hit");
            return Ok(artifact);
        }

        info!(file = ?path, fingerprint = %fp, "precompiling");
        let payload = self
            .transform
            .transform(path, &source)
            .map_err(|source| CacheError::Transform {
                path: path.to_path_buf(),
                source,
            })?;

        let artifact_source = match &self.store {
            Some(store) => ArtifactSource::Cached {
                path: store.publish(&fp, &payload)?,
            },
            None => ArtifactSource::Inline { payload },
        };

        self.remember(&fp, artifact_source.clone());
        Ok(PrecompiledArtifact {
            fingerprint: fp,
            source: artifact_source,
        })
    }

    /// Resolve `path` without overrides and return only its fingerprint.
    ///
    /// Callers use this to seed `precompiled` for later runs.
    pub fn precompile_file(&self, path: &Path) -> Result<Fingerprint, CacheError> {
        self.resolve(path, &PrecompiledOverrides::new())
            .map(|artifact| artifact.fingerprint)
    }

    /// An override is trusted as-is: no hashing and no disk check.
    fn from_override(&self, fp: &Fingerprint) -> Option<PrecompiledArtifact> {
        let source = match self.known_source(fp) {
            Some(source) => source,
            None => ArtifactSource::Cached {
                path: self.store.as_ref()?.artifact_path(fp),
            },
        };
        Some(PrecompiledArtifact {
            fingerprint: fp.clone(),
            source,
        })
    }

    fn lookup(&self, fp: &Fingerprint) -> Option<PrecompiledArtifact> {
        let source = match self.known_source(fp) {
            Some(source) => source,
            None => {
                let store = self.store.as_ref()?;
                if !store.contains(fp) {
                    return None;
                }
                let source = ArtifactSource::Cached {
                    path: store.artifact_path(fp),
                };
                self.remember(fp, source.clone());
                source
            }
        };
        Some(PrecompiledArtifact {
            fingerprint: fp.clone(),
            source,
        })
    }

    fn known_source(&self, fp: &Fingerprint) -> Option<ArtifactSource> {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fp)
            .cloned()
    }

    fn remember(&self, fp: &Fingerprint, source: ArtifactSource) {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fp.clone(), source);
    }
}
