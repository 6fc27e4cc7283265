//! The boundary between a build node and the bundler it drives

use crate::options::OutputTarget;
use crate::sourcemap::SourceMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Entry points, written as one path or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoints {
    Single(PathBuf),
    Multiple(Vec<PathBuf>),
}

impl EntryPoints {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            EntryPoints::Single(path) => vec![path.as_path()],
            EntryPoints::Multiple(paths) => paths.iter().map(PathBuf::as_path).collect(),
        }
    }

    /// Rebase every entry under `dir`, keeping the shape
    pub fn rebase(&self, dir: &Path) -> Self {
        match self {
            EntryPoints::Single(path) => EntryPoints::Single(dir.join(path)),
            EntryPoints::Multiple(paths) => {
                EntryPoints::Multiple(paths.iter().map(|path| dir.join(path)).collect())
            }
        }
    }
}

/// One bundler invocation
///
/// `input` holds absolute paths inside the cache build directory, so
/// relative imports resolve against the mirrored tree and bare imports
/// against the mounted dependency roots.
#[derive(Debug, Serialize)]
pub struct BundleRequest<'a, S> {
    pub input: EntryPoints,
    pub output: &'a [OutputTarget],
    #[serde(flatten)]
    pub options: &'a BTreeMap<String, serde_json::Value>,
    /// State returned by the previous successful bundle, if caching is on
    pub cache: Option<&'a S>,
}

/// What the bundler produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult<S> {
    /// One entry per output target, in target order
    pub outputs: Vec<Generated>,
    /// State to hand back on the next invocation
    #[serde(default)]
    pub cache: Option<S>,
}

/// Generated code for one output target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Generated {
    /// Single-entry build
    Single(Artifact),
    /// Code-split build, keyed by chunk file name
    Chunks(BTreeMap<String, Artifact>),
}

/// One generated file and its optional source map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<SourceMap>,
}

impl Artifact {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }

    pub fn with_map(mut self, map: SourceMap) -> Self {
        self.map = Some(map);
        self
    }
}

/// A bundler a build node can drive
///
/// Implementations must not touch the output directory; everything they
/// produce goes through the returned [`BundleResult`]. Errors are surfaced to
/// the caller as-is.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Opaque state reused by the next invocation
    type State: Send + Sync;

    async fn bundle(&self, request: BundleRequest<'_, Self::State>) -> anyhow::Result<BundleResult<Self::State>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_keeps_shape() {
        let single = EntryPoints::Single("index.js".into()).rebase(Path::new("/cache/build"));
        assert_eq!(single, EntryPoints::Single("/cache/build/index.js".into()));

        let multiple = EntryPoints::Multiple(vec!["a.js".into(), "lib/b.js".into()])
            .rebase(Path::new("/cache/build"));
        assert_eq!(
            multiple.paths(),
            vec![Path::new("/cache/build/a.js"), Path::new("/cache/build/lib/b.js")]
        );
    }

    #[test]
    fn test_generated_shapes_from_json() {
        let single: Generated = serde_json::from_str(r#"{ "code": "var a = 1;" }"#).unwrap();
        assert_eq!(single, Generated::Single(Artifact::new("var a = 1;")));

        let chunks: Generated = serde_json::from_str(
            r#"{ "a.js": { "code": "a" }, "chunk-1.js": { "code": "shared" } }"#,
        )
        .unwrap();
        match chunks {
            Generated::Chunks(chunks) => {
                assert_eq!(chunks.keys().collect::<Vec<_>>(), vec!["a.js", "chunk-1.js"]);
            }
            other => panic!("expected chunks, got {other:?}"),
        }
    }

    #[test]
    fn test_request_serializes_options_inline() {
        let output = vec![OutputTarget::file("out.js")];
        let mut options = BTreeMap::new();
        options.insert("treeshake".to_string(), serde_json::Value::Bool(false));
        let state = serde_json::json!({ "modules": 2 });

        let request = BundleRequest {
            input: EntryPoints::Single("/cache/build/index.js".into()),
            output: &output,
            options: &options,
            cache: Some(&state),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "input": "/cache/build/index.js",
                "output": [{ "file": "out.js", "sourcemap": false }],
                "treeshake": false,
                "cache": { "modules": 2 }
            })
        );
    }
}
