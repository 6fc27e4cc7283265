//! Error types for cache materialization

use rollcache_core::PatchOp;
use std::path::PathBuf;

/// Errors raised while setting up or updating a cache directory
///
/// All of these abort the current build cycle.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// The cache directory itself could not be prepared
    #[error("cache directory I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dependency root could not be linked or copied into its slot
    #[error("failed to mount dependency root {root} at {slot}: {source}")]
    Mount {
        root: PathBuf,
        slot: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A patch operation failed while mirroring the input tree
    #[error("failed to apply `{op}` at {target}: {source}")]
    Apply {
        op: PatchOp,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `apply` was called before `ensure_initialized`
    #[error("cache directory {0} has not been initialized")]
    Uninitialized(PathBuf),
}
