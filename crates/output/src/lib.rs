//! Output reconciliation for generated bundles
//!
//! Generated files are buffered in memory for one build cycle, diffed against
//! what was last committed to the output directory, and only the delta is
//! written. Each file write is atomic (temp file + rename).

pub mod error;
pub mod fs_util;
pub mod patcher;

// Re-exports
pub use error::OutputError;
pub use fs_util::{atomic_write, normalize_path};
pub use patcher::OutputPatcher;
