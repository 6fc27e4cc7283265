//! Tree snapshots of a source directory
//!
//! A snapshot is the complete relative-path structure of a directory at one
//! instant. Entries are kept sorted component-wise, which places every
//! directory directly before its contents; the patch computer relies on this.

use crate::error::ScanError;
use crate::hash::{fingerprint_path, Fingerprint, FingerprintMode};
use crate::patch::{self, Patch};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Type of tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

/// Entry in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the snapshot root
    pub path: PathBuf,
    /// Kind of entry
    pub kind: EntryKind,
    /// Content fingerprint (files only)
    pub fingerprint: Option<Fingerprint>,
}

impl TreeEntry {
    /// Create a file entry
    pub fn file(path: impl Into<PathBuf>, fingerprint: Fingerprint) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            fingerprint: Some(fingerprint),
        }
    }

    /// Create a directory entry
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            fingerprint: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Point-in-time record of a directory's structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    entries: Vec<TreeEntry>,
}

impl TreeSnapshot {
    /// Snapshot of an empty directory
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from arbitrary entries
    ///
    /// Entries are sorted and duplicate paths collapse to the last one given.
    pub fn from_entries(entries: impl IntoIterator<Item = TreeEntry>) -> Self {
        let mut entries: Vec<TreeEntry> = entries.into_iter().collect();
        entries.reverse();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.dedup_by(|later, earlier| later.path == earlier.path);
        Self { entries }
    }

    /// Build a snapshot from file paths, adding every ancestor directory
    pub fn from_files(files: impl IntoIterator<Item = (PathBuf, Fingerprint)>) -> Self {
        let mut directories = BTreeSet::new();
        let mut entries = Vec::new();

        for (path, fingerprint) in files {
            let mut parent = path.parent();
            while let Some(dir) = parent {
                if dir.as_os_str().is_empty() || !directories.insert(dir.to_path_buf()) {
                    break;
                }
                parent = dir.parent();
            }
            entries.push(TreeEntry::file(path, fingerprint));
        }

        entries.extend(directories.into_iter().map(TreeEntry::directory));
        Self::from_entries(entries)
    }

    /// Scan `root` recursively
    ///
    /// Symlinks are followed so merged input trees built from links are seen
    /// as the files they point at. Anything that is neither a file nor a
    /// directory is skipped.
    pub fn scan(root: &Path, mode: FingerprintMode) -> Result<Self, ScanError> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).min_depth(1) {
            let entry = entry.map_err(|source| ScanError::Walk {
                root: root.to_path_buf(),
                source,
            })?;

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| ScanError::OutsideRoot {
                    root: root.to_path_buf(),
                    path: entry.path().to_path_buf(),
                })?
                .to_path_buf();

            let file_type = entry.file_type();
            if file_type.is_dir() {
                entries.push(TreeEntry::directory(relative));
            } else if file_type.is_file() {
                let io_err = |source: std::io::Error| ScanError::Io {
                    path: entry.path().to_path_buf(),
                    source,
                };
                let metadata = entry.metadata().map_err(|e| ScanError::Walk {
                    root: root.to_path_buf(),
                    source: e,
                })?;
                let fingerprint = fingerprint_path(entry.path(), &metadata, mode).map_err(io_err)?;
                entries.push(TreeEntry::file(relative, fingerprint));
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::trace!(root = %root.display(), entries = entries.len(), "scanned tree");
        Ok(Self { entries })
    }

    /// Entries in component-wise path order
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Look up an entry by relative path
    pub fn get(&self, path: &Path) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|entry| entry.path.as_path().cmp(path))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Iterate over file entries only
    pub fn files(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the ordered patch that turns `self` into `current`
    pub fn diff(&self, current: &TreeSnapshot) -> Patch {
        patch::compute(self, current)
    }
}
