//! Error types for build nodes

use rollcache_core::ScanError;
use rollcache_materialize::MaterializeError;
use rollcache_output::OutputError;
use std::path::PathBuf;

/// Invalid node configuration, reported at construction time
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A dependency root was given as a relative path
    #[error("nodeModulesPath must be fully qualified and you passed a relative path")]
    RelativeDependencyRoot(PathBuf),

    /// No entry points were configured
    #[error("bundler options must name at least one input")]
    MissingInput,

    /// An entry point is absolute or escapes the input directory
    #[error("input {0} must be relative to the input directory")]
    EntryOutsideInput(PathBuf),

    /// No output targets were configured
    #[error("bundler options must name at least one output target")]
    MissingOutput,

    /// An output target has neither `file` nor `dir`
    #[error("output target {0} needs either `file` or `dir`")]
    MissingOutputLocation(usize),

    /// The external bundler command is empty
    #[error("bundler command must not be empty")]
    EmptyCommand,

    /// The working directory could not be determined for root detection
    #[error("failed to determine working directory: {0}")]
    WorkingDir(#[source] std::io::Error),

    /// The configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure of a single build cycle (or of node construction)
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// The bundler failed; the message is passed through untouched
    #[error(transparent)]
    Bundle(anyhow::Error),

    /// The bundler returned a different number of results than targets
    #[error("bundler returned {actual} outputs for {expected} targets")]
    TargetMismatch { expected: usize, actual: usize },

    /// A single-file result was produced for a target without `file`, or a
    /// chunked result for a target without `dir`
    #[error("output target {index} has no `{needed}` for the generated {shape}")]
    TargetShape {
        index: usize,
        needed: &'static str,
        shape: &'static str,
    },

    #[error("failed to serialize source map: {0}")]
    SourceMap(#[from] serde_json::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}
