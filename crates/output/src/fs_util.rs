//! Path normalization and atomic file writes for the output directory

use crate::error::OutputError;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Normalize an output-relative path
///
/// - Removes `./` components
/// - Rejects absolute paths and `..`
/// - Rejects paths that normalize to nothing
pub fn normalize_path(path: &Path) -> Result<PathBuf, OutputError> {
    let invalid = |reason| OutputError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("`..` is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the output directory"))
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    Ok(normalized)
}

/// Atomically replace `target` with `data`
///
/// Writes into a temporary file in the target's directory, syncs it, then
/// renames it over the target. Readers see either the old or the new file.
pub fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_data()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_normalize_strips_current_dir() {
        assert_eq!(
            normalize_path(Path::new("./chunks/./a.js")).unwrap(),
            PathBuf::from("chunks/a.js")
        );
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        assert!(normalize_path(Path::new("../out.js")).is_err());
        assert!(normalize_path(Path::new("dist/../../out.js")).is_err());
        assert!(normalize_path(Path::new("/abs/out.js")).is_err());
        assert!(normalize_path(Path::new(".")).is_err());
    }

    #[test]
    fn test_atomic_write_replaces_and_cleans_up() -> io::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let target = temp_dir.path().join("out.js");

        atomic_write(&target, b"var a = 1;")?;
        atomic_write(&target, b"var a = 2;")?;

        assert_eq!(fs::read_to_string(&target)?, "var a = 2;");
        assert_eq!(fs::read_dir(temp_dir.path())?.count(), 1);
        Ok(())
    }
}
