//! Nested dependency-root layout
//!
//! A flat directory cannot give different source subtrees different views of
//! their dependencies, so the roots are mounted into a chain of nested
//! directories. For roots `[R1, R2, R3]` the layout is:
//!
//! ```text
//! <cache>/node_modules        -> R1
//! <cache>/0/node_modules      -> R2
//! <cache>/0/1/node_modules    -> R3
//! <cache>/0/1/build/index.js     (mirrored input)
//! ```
//!
//! Node-style lookups walk outward from the importing file, so the
//! last-listed root is consulted first and `R1` is visible to every lookup
//! that fails to resolve closer in.

use crate::error::MaterializeError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name of the dependency slot at every nesting level
pub const DEPENDENCY_SLOT: &str = "node_modules";

/// Name of the innermost level, which holds the mirrored input tree
pub const BUILD_DIR_NAME: &str = "build";

/// One dependency root and the slot it is mounted at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Externally maintained dependency directory
    pub root: PathBuf,
    /// `<level>/node_modules` inside the cache directory
    pub slot: PathBuf,
}

/// Explicit mount list plus the innermost build directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    /// Mounts, outermost first
    pub mounts: Vec<Mount>,
    /// Directory the input tree is mirrored into
    pub build_dir: PathBuf,
}

impl MountPlan {
    /// Lay out `roots` beneath `cache_root`, root `i` at nesting level `i`
    pub fn new(cache_root: &Path, roots: &[PathBuf]) -> Self {
        let mut mounts = Vec::with_capacity(roots.len());
        let mut level = cache_root.to_path_buf();

        for (index, root) in roots.iter().enumerate() {
            mounts.push(Mount {
                root: root.clone(),
                slot: level.join(DEPENDENCY_SLOT),
            });
            if index + 1 < roots.len() {
                level = level.join(index.to_string());
            }
        }

        Self {
            mounts,
            build_dir: level.join(BUILD_DIR_NAME),
        }
    }

    /// Create every level directory and mount every root
    ///
    /// Slots that already exist are left untouched, so this is safe to run
    /// against a cache directory that was set up by an earlier process.
    pub fn mount(&self) -> Result<(), MaterializeError> {
        for mount in &self.mounts {
            if let Some(level) = mount.slot.parent() {
                fs::create_dir_all(level).map_err(|source| MaterializeError::Io {
                    path: level.to_path_buf(),
                    source,
                })?;
            }

            if fs::symlink_metadata(&mount.slot).is_ok() {
                debug!(slot = %mount.slot.display(), "dependency slot already mounted");
                continue;
            }

            link_or_copy(&mount.root, &mount.slot).map_err(|source| MaterializeError::Mount {
                root: mount.root.clone(),
                slot: mount.slot.clone(),
                source,
            })?;
            debug!(root = %mount.root.display(), slot = %mount.slot.display(), "mounted dependency root");
        }

        fs::create_dir_all(&self.build_dir).map_err(|source| MaterializeError::Io {
            path: self.build_dir.clone(),
            source,
        })
    }
}

/// Symlink `root` at `slot`, falling back to a recursive copy
fn link_or_copy(root: &Path, slot: &Path) -> io::Result<()> {
    match symlink_dir(root, slot) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(
                root = %root.display(),
                error = %err,
                "symlink unavailable, copying dependency root instead"
            );
            copy_tree(root, slot)
        }
    }
}

#[cfg(unix)]
fn symlink_dir(root: &Path, slot: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(root, slot)
}

#[cfg(windows)]
fn symlink_dir(root: &Path, slot: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(root, slot)
}

#[cfg(not(any(unix, windows)))]
fn symlink_dir(_root: &Path, _slot: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks are not supported"))
}

fn copy_tree(root: &Path, slot: &Path) -> io::Result<()> {
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = slot.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_single_root() {
        let plan = MountPlan::new(Path::new("/cache"), &[PathBuf::from("/deps")]);

        assert_eq!(
            plan.mounts,
            vec![Mount {
                root: PathBuf::from("/deps"),
                slot: PathBuf::from("/cache/node_modules"),
            }]
        );
        assert_eq!(plan.build_dir, PathBuf::from("/cache/build"));
    }

    #[test]
    fn test_plan_mounts_root_i_at_level_i() {
        let roots = vec![PathBuf::from("/r1"), PathBuf::from("/r2"), PathBuf::from("/r3")];
        let plan = MountPlan::new(Path::new("/cache"), &roots);

        let slots: Vec<_> = plan
            .mounts
            .iter()
            .map(|m| (m.root.clone(), m.slot.clone()))
            .collect();
        assert_eq!(
            slots,
            vec![
                (PathBuf::from("/r1"), PathBuf::from("/cache/node_modules")),
                (PathBuf::from("/r2"), PathBuf::from("/cache/0/node_modules")),
                (PathBuf::from("/r3"), PathBuf::from("/cache/0/1/node_modules")),
            ]
        );
        assert_eq!(plan.build_dir, PathBuf::from("/cache/0/1/build"));
    }

    #[test]
    fn test_plan_without_roots() {
        let plan = MountPlan::new(Path::new("/cache"), &[]);
        assert!(plan.mounts.is_empty());
        assert_eq!(plan.build_dir, PathBuf::from("/cache/build"));
    }

    #[test]
    fn test_mount_is_idempotent() -> io::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let deps = temp_dir.path().join("deps");
        fs::create_dir_all(deps.join("left-pad"))?;
        fs::write(deps.join("left-pad/index.js"), "export default 1")?;

        let plan = MountPlan::new(&temp_dir.path().join("cache"), &[deps.clone()]);
        plan.mount().unwrap();
        plan.mount().unwrap();

        let mounted = plan.mounts[0].slot.join("left-pad/index.js");
        assert_eq!(fs::read_to_string(mounted)?, "export default 1");
        assert!(plan.build_dir.is_dir());
        Ok(())
    }

    #[test]
    fn test_copy_tree_mirrors_contents() -> io::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path().join("root");
        fs::create_dir_all(root.join("a/b"))?;
        fs::write(root.join("a/b/c.js"), "c")?;

        let slot = temp_dir.path().join("slot");
        copy_tree(&root, &slot)?;

        assert_eq!(fs::read_to_string(slot.join("a/b/c.js"))?, "c");
        Ok(())
    }
}
