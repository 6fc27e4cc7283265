//! rollcache core - tree snapshots and patch computation
//!
//! This crate provides the leaf data model of the incremental build engine:
//! - BLAKE3 content fingerprints
//! - Tree snapshots of a source directory
//! - Ordered patch computation between two snapshots

pub mod error;
pub mod hash;
pub mod patch;
pub mod tree;

// Re-export main types for convenience
pub use error::ScanError;
pub use hash::{fingerprint_bytes, fingerprint_file, Fingerprint, FingerprintMode};
pub use patch::{Patch, PatchOp};
pub use tree::{EntryKind, TreeEntry, TreeSnapshot};
