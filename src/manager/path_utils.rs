// src/manager/path_utils.rs

use std::path::{Path, PathBuf};

/// Express `path` relative to `root` for reporting.
///
/// - Relative paths are taken as already relative to the root.
/// - Absolute paths are stripped of `root`, retrying with both sides
///   canonicalized (symlinked temp dirs, `/private/var` on macOS).
/// - Paths outside the root are reported as given.
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        return path.to_path_buf();
    }

    if let Ok(rel) = path.strip_prefix(root) {
        return rel.to_path_buf();
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return rel.to_path_buf();
        }
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        assert_eq!(
            relative_to(Path::new("/work"), Path::new("/work/test/fixture/a.fk")),
            PathBuf::from("test/fixture/a.fk")
        );
    }

    #[test]
    fn keeps_relative_and_foreign_paths() {
        assert_eq!(
            relative_to(Path::new("/work"), Path::new("test/a.fk")),
            PathBuf::from("test/a.fk")
        );
        assert_eq!(
            relative_to(Path::new("/work"), Path::new("/elsewhere/a.fk")),
            PathBuf::from("/elsewhere/a.fk")
        );
    }
}
