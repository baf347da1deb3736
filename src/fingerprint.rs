// src/fingerprint.rs

//! Content fingerprints for precompiled artifacts.
//!
//! A fingerprint identifies a `(source bytes, transform config)` pair. Both
//! halves are length-prefixed before hashing, so moving bytes from one half
//! to the other can never produce the same key.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Bumped whenever the fingerprint layout changes.
const FINGERPRINT_DOMAIN: &[u8] = b"forkrun-fingerprint-v1";

/// Hex-encoded blake3 digest of a source file plus its transform config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = anyhow::Error;

    /// Accepts exactly 64 lowercase hex characters.
    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == 64
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(anyhow!(
                "invalid fingerprint {s:?}: expected 64 lowercase hex characters"
            ));
        }
        Ok(Fingerprint(s.to_string()))
    }
}

/// Compute the fingerprint of `source` under the given transform config.
pub fn fingerprint(source: &[u8], transform_config: &[u8]) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(FINGERPRINT_DOMAIN);
    hasher.update(&(transform_config.len() as u64).to_le_bytes());
    hasher.update(transform_config);
    hasher.update(&(source.len() as u64).to_le_bytes());
    hasher.update(source);
    Fingerprint(hasher.finalize().to_hex().to_string())
}

/// Read a file and fingerprint it.
pub fn fingerprint_file(path: &Path, transform_config: &[u8]) -> Result<Fingerprint> {
    let mut file = File::open(path)
        .with_context(|| format!("opening file for fingerprinting: {:?}", path))?;
    let mut source = Vec::new();
    file.read_to_end(&mut source)
        .with_context(|| format!("reading file for fingerprinting: {:?}", path))?;
    Ok(fingerprint(&source, transform_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_fingerprint() {
        let a = fingerprint(b"pass works", b"cat|fk");
        let b = fingerprint(b"pass works", b"cat|fk");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn transform_config_is_part_of_the_key() {
        let a = fingerprint(b"pass works", b"preset-a");
        let b = fingerprint(b"pass works", b"preset-b");
        assert_ne!(a, b);
    }

    #[test]
    fn halves_do_not_bleed_into_each_other() {
        assert_ne!(fingerprint(b"ab", b"c"), fingerprint(b"b", b"ac"));
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!("zz".parse::<Fingerprint>().is_err());
        assert!("A".repeat(64).parse::<Fingerprint>().is_err());
        let fp = fingerprint(b"x", b"");
        assert_eq!(fp.as_str().parse::<Fingerprint>().ok(), Some(fp));
    }

    #[test]
    fn file_fingerprint_matches_bytes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.fk");
        std::fs::write(&path, b"pass one")?;
        assert_eq!(fingerprint_file(&path, b"cfg")?, fingerprint(b"pass one", b"cfg"));
        Ok(())
    }
}
