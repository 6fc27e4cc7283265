//! Cache directory materialization
//!
//! Keeps a persistent, bundler-visible mirror of an input tree in sync with
//! the patches computed by `rollcache-core`:
//! - Nested mounting of dependency-resolution roots (one-time setup)
//! - Ordered patch application (every cycle)
//! - File duplication strategy chosen once per cache directory

pub mod cache_dir;
pub mod duplicate;
pub mod error;
pub mod mount;

// Re-exports
pub use cache_dir::CacheDir;
pub use duplicate::FileDuplicator;
pub use error::MaterializeError;
pub use mount::{Mount, MountPlan, BUILD_DIR_NAME, DEPENDENCY_SLOT};
