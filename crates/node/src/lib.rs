//! Build orchestration for an incremental bundler node
//!
//! A [`BuildNode`] owns one input directory, one cache directory and one
//! output directory. Each call to [`BuildNode::run_cycle`]:
//! 1. snapshots the input and diffs it against the last cycle,
//! 2. mirrors the patch into the cache directory,
//! 3. invokes the [`Bundler`] unless nothing changed,
//! 4. reconciles the generated files against the committed output.

pub mod bundler;
pub mod error;
pub mod node;
pub mod options;
pub mod process;
pub mod sourcemap;
mod targets;

// Re-exports
pub use bundler::{Artifact, BundleRequest, BundleResult, Bundler, EntryPoints, Generated};
pub use error::{BuildError, ConfigError};
pub use node::{BuildNode, CycleOutcome, NodeState};
pub use options::{BundlerOptions, NodeOptions, OutputTarget, ProcessConfig, SourceMapMode};
pub use process::ProcessBundler;
pub use sourcemap::{SourceMap, SOURCE_MAP_MARKER};
