//! Node configuration
//!
//! `NodeOptions` is read from a TOML file. Keys may be written in snake_case
//! or in the camelCase spelling used by JavaScript bundler configs
//! (`nodeModulesPath`, `sourcemapFile`).

use crate::bundler::EntryPoints;
use crate::error::ConfigError;
use rollcache_core::FingerprintMode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Directory name searched for when no dependency roots are configured
pub const NODE_MODULES: &str = "node_modules";

/// Label used when a node has neither `name` nor `annotation`
const DEFAULT_LABEL: &str = "rollcache";

/// A value that may be written either bare or as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Options for one build node
#[derive(Debug, Clone, Deserialize)]
pub struct NodeOptions {
    /// Free-form description, used only for logging
    #[serde(default)]
    pub annotation: Option<String>,

    /// Node name, used for logging and the default cache directory
    #[serde(default)]
    pub name: Option<String>,

    /// Options forwarded to the bundler
    pub rollup: BundlerOptions,

    /// Retain the bundler's state between cycles
    #[serde(default = "default_cache")]
    pub cache: bool,

    /// Dependency roots, first one outermost and last one nearest to the
    /// build directory
    #[serde(default, alias = "nodeModulesPath")]
    pub node_modules_path: Option<OneOrMany<PathBuf>>,

    /// How input files are fingerprinted
    #[serde(default)]
    pub fingerprint: FingerprintMode,

    /// External bundler process, used by the command-line host
    #[serde(default)]
    pub bundler: Option<ProcessConfig>,
}

fn default_cache() -> bool {
    true
}

impl NodeOptions {
    /// Options with caching on and no explicit dependency roots
    pub fn new(rollup: BundlerOptions) -> Self {
        Self {
            annotation: None,
            name: None,
            rollup,
            cache: true,
            node_modules_path: None,
            fingerprint: FingerprintMode::default(),
            bundler: None,
        }
    }

    /// Parse options from TOML source
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Human-readable label for logs
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.annotation.as_deref())
            .unwrap_or(DEFAULT_LABEL)
    }

    /// Check everything that can be checked before the first cycle
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(roots) = &self.node_modules_path {
            let roots = match roots {
                OneOrMany::One(root) => std::slice::from_ref(root),
                OneOrMany::Many(roots) => roots.as_slice(),
            };
            if let Some(root) = roots.iter().find(|root| !root.is_absolute()) {
                return Err(ConfigError::RelativeDependencyRoot(root.clone()));
            }
        }

        let entries = self.rollup.input.paths();
        if entries.is_empty() {
            return Err(ConfigError::MissingInput);
        }
        for entry in entries {
            let escapes = entry
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(ConfigError::EntryOutsideInput(entry.to_path_buf()));
            }
        }

        let targets = self.rollup.targets();
        if targets.is_empty() {
            return Err(ConfigError::MissingOutput);
        }
        if let Some(index) = targets
            .iter()
            .position(|target| target.file.is_none() && target.dir.is_none())
        {
            return Err(ConfigError::MissingOutputLocation(index));
        }
        Ok(())
    }

    /// Configured dependency roots, or the nearest `node_modules` above the
    /// working directory
    pub fn dependency_roots(&self) -> Result<Vec<PathBuf>, ConfigError> {
        match &self.node_modules_path {
            Some(roots) => Ok(roots.clone().into_vec()),
            None => {
                let cwd = std::env::current_dir().map_err(ConfigError::WorkingDir)?;
                Ok(vec![find_node_modules(&cwd)])
            }
        }
    }
}

/// Walk up from `start` looking for a `node_modules` directory
///
/// Falls back to `<start>/node_modules` if none exists, which mounts as a
/// dangling link and resolves nothing.
pub fn find_node_modules(start: &Path) -> PathBuf {
    start
        .ancestors()
        .map(|dir| dir.join(NODE_MODULES))
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| start.join(NODE_MODULES))
}

/// Options handed to the bundler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlerOptions {
    /// Entry points, relative to the input directory
    pub input: EntryPoints,

    /// Output targets
    pub output: OneOrMany<OutputTarget>,

    /// Anything else, forwarded to the bundler untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BundlerOptions {
    pub fn new(input: EntryPoints, output: Vec<OutputTarget>) -> Self {
        Self {
            input,
            output: OneOrMany::Many(output),
            extra: BTreeMap::new(),
        }
    }

    /// Output targets as a slice
    pub fn targets(&self) -> &[OutputTarget] {
        match &self.output {
            OneOrMany::One(target) => std::slice::from_ref(target),
            OneOrMany::Many(targets) => targets,
        }
    }
}

/// One output target
///
/// Single-entry builds write to `file`; code-split builds write every chunk
/// under `dir`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub sourcemap: SourceMapMode,

    /// Path recorded as the map's `file`; resolved inside the build
    /// directory before the bundler sees it
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "sourcemap_file")]
    pub sourcemap_file: Option<PathBuf>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl OutputTarget {
    /// Single-file target
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::default()
        }
    }

    /// Chunk directory target
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_sourcemap(mut self, mode: SourceMapMode) -> Self {
        self.sourcemap = mode;
        self
    }
}

/// Source map emission for a target
///
/// Written in config as `false`, `true` or `"inline"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMapMode {
    #[default]
    Off,
    /// Side file `<name>.map` plus a reference comment
    File,
    /// Base64 data URL in the reference comment
    Inline,
}

impl SourceMapMode {
    pub fn is_enabled(self) -> bool {
        self != SourceMapMode::Off
    }
}

impl Serialize for SourceMapMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SourceMapMode::Off => serializer.serialize_bool(false),
            SourceMapMode::File => serializer.serialize_bool(true),
            SourceMapMode::Inline => serializer.serialize_str("inline"),
        }
    }
}

impl<'de> Deserialize<'de> for SourceMapMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Keyword(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(false) => Ok(SourceMapMode::Off),
            Repr::Flag(true) => Ok(SourceMapMode::File),
            Repr::Keyword(word) if word == "inline" => Ok(SourceMapMode::Inline),
            Repr::Keyword(word) => Err(serde::de::Error::custom(format!(
                "invalid sourcemap mode `{word}`, expected true, false or \"inline\""
            ))),
        }
    }
}

/// External bundler command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,
}
