//! Errors raised while snapshotting a directory

use std::path::PathBuf;

/// Failure to build a [`TreeSnapshot`](crate::TreeSnapshot) from disk
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Directory traversal failed (missing root, permission, symlink loop)
    #[error("failed to scan {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A file could not be read for fingerprinting
    #[error("failed to fingerprint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Traversal produced a path outside the scanned root
    #[error("{path} is not inside {root}")]
    OutsideRoot { root: PathBuf, path: PathBuf },
}
