//! Persistent cache directory owned by one build node

use crate::duplicate::{remove_if_present, FileDuplicator};
use crate::error::MaterializeError;
use crate::mount::MountPlan;
use rollcache_core::{Patch, PatchOp};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bundler-visible mirror of an input tree
///
/// The top-level directory lives as long as the owning build node. Dependency
/// roots are mounted once by [`CacheDir::ensure_initialized`]; mirrored files
/// are then kept in sync by [`CacheDir::apply`] every cycle.
#[derive(Debug)]
pub struct CacheDir {
    /// Top-level cache directory
    root: PathBuf,
    /// Canonical innermost build directory, set on first initialization
    build_dir: Option<PathBuf>,
    /// Copy strategy, chosen once
    duplicator: FileDuplicator,
}

impl CacheDir {
    /// Allocate (or reopen) the cache directory at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, MaterializeError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| MaterializeError::Io {
            path: root.clone(),
            source,
        })?;
        let duplicator = FileDuplicator::detect(&root);

        Ok(Self {
            root,
            build_dir: None,
            duplicator,
        })
    }

    /// Top-level cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Innermost build directory, once initialized
    pub fn build_dir(&self) -> Option<&Path> {
        self.build_dir.as_deref()
    }

    pub fn duplicator(&self) -> FileDuplicator {
        self.duplicator
    }

    /// Mount the dependency roots and return the canonical build directory
    ///
    /// Only the first call does any work; later calls return the same path.
    pub fn ensure_initialized(&mut self, roots: &[PathBuf]) -> Result<PathBuf, MaterializeError> {
        if let Some(build_dir) = &self.build_dir {
            return Ok(build_dir.clone());
        }

        let plan = MountPlan::new(&self.root, roots);
        plan.mount()?;

        // Resolve through any symlinked temp dirs so the bundler sees the
        // same paths it will report back.
        let build_dir = fs::canonicalize(&plan.build_dir).map_err(|source| MaterializeError::Io {
            path: plan.build_dir.clone(),
            source,
        })?;
        debug!(build_dir = %build_dir.display(), roots = roots.len(), "cache directory initialized");

        self.build_dir = Some(build_dir.clone());
        Ok(build_dir)
    }

    /// Apply `patch` in order, copying file contents from `source_root`
    ///
    /// Every operation is idempotent: existing directories are accepted,
    /// missing removal targets are ignored, and creates overwrite. A cycle
    /// that failed halfway can therefore be replayed from the same patch.
    pub fn apply(&self, source_root: &Path, patch: &Patch) -> Result<(), MaterializeError> {
        let build_dir = self
            .build_dir
            .as_deref()
            .ok_or_else(|| MaterializeError::Uninitialized(self.root.clone()))?;

        for op in patch {
            let target = build_dir.join(op.path());
            self.apply_op(source_root, op, &target)
                .map_err(|source| MaterializeError::Apply {
                    op: op.clone(),
                    target: target.clone(),
                    source,
                })?;
        }

        if !patch.is_empty() {
            debug!(ops = patch.len(), "applied patch to cache directory");
        }
        Ok(())
    }

    fn apply_op(&self, source_root: &Path, op: &PatchOp, target: &Path) -> io::Result<()> {
        match op {
            PatchOp::Mkdir(_) => match fs::create_dir(target) {
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && target.is_dir() => Ok(()),
                other => other,
            },
            PatchOp::Rmdir(_) => match fs::remove_dir(target) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
            PatchOp::Unlink(_) => remove_if_present(target),
            PatchOp::Create(path) | PatchOp::Change(path) => {
                self.duplicator.duplicate(&source_root.join(path), target)
            }
        }
    }
}
