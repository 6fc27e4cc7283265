//! Patch computation between two tree snapshots
//!
//! The patch is an ordered list of filesystem operations that is safe to
//! apply front to back: removals come first, children before their parent
//! directory, then creations and changes, parent directories before their
//! contents.

use crate::tree::{EntryKind, TreeEntry, TreeSnapshot};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single filesystem operation, relative to the tree root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatchOp {
    /// Create a directory
    Mkdir(PathBuf),
    /// Remove an (empty) directory
    Rmdir(PathBuf),
    /// Remove a file
    Unlink(PathBuf),
    /// Create a new file
    Create(PathBuf),
    /// Replace the contents of an existing file
    Change(PathBuf),
}

impl PatchOp {
    /// Path the operation applies to
    pub fn path(&self) -> &Path {
        match self {
            PatchOp::Mkdir(path)
            | PatchOp::Rmdir(path)
            | PatchOp::Unlink(path)
            | PatchOp::Create(path)
            | PatchOp::Change(path) => path,
        }
    }

    /// Short operation name ("mkdir", "create", ...)
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Mkdir(_) => "mkdir",
            PatchOp::Rmdir(_) => "rmdir",
            PatchOp::Unlink(_) => "unlink",
            PatchOp::Create(_) => "create",
            PatchOp::Change(_) => "change",
        }
    }

    /// True for operations on files rather than directories
    pub fn is_file_op(&self) -> bool {
        matches!(self, PatchOp::Unlink(_) | PatchOp::Create(_) | PatchOp::Change(_))
    }

    fn removal(entry: &TreeEntry) -> Self {
        match entry.kind {
            EntryKind::Directory => PatchOp::Rmdir(entry.path.clone()),
            EntryKind::File => PatchOp::Unlink(entry.path.clone()),
        }
    }

    fn addition(entry: &TreeEntry) -> Self {
        match entry.kind {
            EntryKind::Directory => PatchOp::Mkdir(entry.path.clone()),
            EntryKind::File => PatchOp::Create(entry.path.clone()),
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.path().display())
    }
}

/// Ordered sequence of patch operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    ops: Vec<PatchOp>,
}

impl Patch {
    pub fn new(ops: Vec<PatchOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOp> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<PatchOp> {
        self.ops
    }
}

impl IntoIterator for Patch {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOp;
    type IntoIter = std::slice::Iter<'a, PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

/// Compute the patch turning `previous` into `current`
///
/// Both snapshots are sorted component-wise, so a single merge pass over the
/// two entry lists finds every difference.
pub fn compute(previous: &TreeSnapshot, current: &TreeSnapshot) -> Patch {
    let prev = previous.entries();
    let cur = current.entries();

    let mut removals = Vec::new();
    let mut additions = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < prev.len() && j < cur.len() {
        let (old, new) = (&prev[i], &cur[j]);
        match old.path.cmp(&new.path) {
            Ordering::Less => {
                removals.push(PatchOp::removal(old));
                i += 1;
            }
            Ordering::Greater => {
                additions.push(PatchOp::addition(new));
                j += 1;
            }
            Ordering::Equal => {
                if old.kind != new.kind {
                    // file <-> directory swap at the same path
                    removals.push(PatchOp::removal(old));
                    additions.push(PatchOp::addition(new));
                } else if old.kind == EntryKind::File && old.fingerprint != new.fingerprint {
                    additions.push(PatchOp::Change(new.path.clone()));
                }
                i += 1;
                j += 1;
            }
        }
    }
    removals.extend(prev[i..].iter().map(PatchOp::removal));
    additions.extend(cur[j..].iter().map(PatchOp::addition));

    // Forward order has parents first; removals need children first.
    removals.reverse();
    removals.extend(additions);
    Patch::new(removals)
}
