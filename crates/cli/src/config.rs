//! Loading node configuration from disk

use anyhow::{Context, Result};
use rollcache_node::NodeOptions;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory, next to the output directory, that holds per-node caches
pub const CACHE_DIR_NAME: &str = ".rollcache-cache";

/// Read and parse a TOML node configuration
pub fn load(path: &Path) -> Result<NodeOptions> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    NodeOptions::from_toml(&source).with_context(|| format!("Failed to parse config {}", path.display()))
}

/// `<output>/../.rollcache-cache/<label>`
pub fn default_cache_dir(output: &Path, label: &str) -> PathBuf {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    parent.join(CACHE_DIR_NAME).join(label)
}

/// Resolve `path` against the working directory
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    Ok(cwd.join(path))
}
