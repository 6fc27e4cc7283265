//! Buffered output with minimal commits

use crate::error::OutputError;
use crate::fs_util::{atomic_write, normalize_path};
use rollcache_core::{fingerprint_bytes, Fingerprint, PatchOp, TreeSnapshot};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stands in for content whose state on disk is unknown after a failed commit
const UNKNOWN_CONTENT: Fingerprint = Fingerprint::from_bytes([0; 32]);

/// Output tree for one build node
///
/// Files are buffered with [`OutputPatcher::add`] during a cycle and
/// reconciled with [`OutputPatcher::commit`]. Only paths whose bytes changed
/// are rewritten; identical files are left alone and not reported. Files the
/// patcher never wrote are never touched.
#[derive(Debug)]
pub struct OutputPatcher {
    /// Persistent output directory
    output_dir: PathBuf,
    /// What this patcher believes it has left on disk
    committed: TreeSnapshot,
    /// Files buffered for the next commit
    pending: BTreeMap<PathBuf, Vec<u8>>,
}

impl OutputPatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            committed: TreeSnapshot::empty(),
            pending: BTreeMap::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Snapshot of the paths written by earlier commits
    pub fn committed(&self) -> &TreeSnapshot {
        &self.committed
    }

    /// Buffered paths awaiting commit
    pub fn pending_paths(&self) -> impl Iterator<Item = &Path> {
        self.pending.keys().map(PathBuf::as_path)
    }

    /// Buffer one output file; a later `add` for the same path wins
    pub fn add(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Result<(), OutputError> {
        let path = normalize_path(path.as_ref())?;
        self.pending.insert(path, content.into());
        Ok(())
    }

    /// Drop everything buffered since the last commit
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            debug!(files = self.pending.len(), "discarding buffered output");
            self.pending.clear();
        }
    }

    /// Reconcile the buffered files against the committed output
    ///
    /// Returns the operations performed, in the order they were applied.
    /// The first commit starts from an empty record, so it only ever creates
    /// or overwrites the buffered paths. If a step fails, every path this
    /// commit or the previous one may have written is marked unknown: the
    /// next commit rewrites the paths it still wants and removes the rest.
    pub fn commit(&mut self) -> Result<Vec<PatchOp>, OutputError> {
        let pending = std::mem::take(&mut self.pending);
        let current = TreeSnapshot::from_files(
            pending
                .iter()
                .map(|(path, content)| (path.clone(), fingerprint_bytes(content))),
        );
        let patch = self.committed.diff(&current);

        let applied = fs::create_dir_all(&self.output_dir)
            .map_err(|source| OutputError::Io {
                action: "create",
                path: self.output_dir.clone(),
                source,
            })
            .and_then(|()| patch.iter().try_for_each(|op| self.apply_op(op, &pending)));
        if let Err(err) = applied {
            warn!(output = %self.output_dir.display(), error = %err, "output commit failed");
            self.committed = unknown_state(&self.committed, &current);
            return Err(err);
        }

        if patch.is_empty() {
            debug!(output = %self.output_dir.display(), "output unchanged");
        } else {
            info!(
                output = %self.output_dir.display(),
                ops = patch.len(),
                "committed output changes"
            );
        }

        self.committed = current;
        Ok(patch.into_ops())
    }

    fn apply_op(&self, op: &PatchOp, pending: &BTreeMap<PathBuf, Vec<u8>>) -> Result<(), OutputError> {
        let target = self.output_dir.join(op.path());
        let fail = |action: &'static str| {
            let path = target.clone();
            move |source: io::Error| OutputError::Io { action, path, source }
        };

        match op {
            PatchOp::Mkdir(_) => match fs::create_dir(&target) {
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && target.is_dir() => Ok(()),
                other => other.map_err(fail("create directory")),
            },
            PatchOp::Rmdir(_) => match fs::remove_dir(&target) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other.map_err(fail("remove directory")),
            },
            PatchOp::Unlink(_) => match fs::remove_file(&target) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other.map_err(fail("remove")),
            },
            PatchOp::Create(path) | PatchOp::Change(path) => {
                let content = pending.get(path).map(Vec::as_slice).unwrap_or_default();
                debug!(op = %op, "writing output file");
                // After a failed commit the parent's mkdir may never have run.
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(fail("create directory"))?;
                }
                atomic_write(&target, content).map_err(fail("write"))
            }
        }
    }
}

/// Every file either snapshot names, with unknown content
///
/// Where one side has a file at a path the other uses as a directory, the
/// directory is kept, so the next commit removes its contents before the
/// file is written back.
fn unknown_state(previous: &TreeSnapshot, wanted: &TreeSnapshot) -> TreeSnapshot {
    let files = previous.files().chain(wanted.files());
    TreeSnapshot::from_files(files.map(|entry| (entry.path.clone(), UNKNOWN_CONTENT)))
}
