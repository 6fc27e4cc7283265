//! Version 3 source maps as produced by the bundler

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Prefix of the comment that links generated code to its map
pub const SOURCE_MAP_MARKER: &str = "//# sourceMappingURL=";

const DATA_URL_PREFIX: &str = "data:application/json;charset=utf-8;base64,";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The map as a base64 `data:` URL
    pub fn to_url(&self) -> serde_json::Result<String> {
        Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(self.to_json()?)))
    }
}

/// Append a `sourceMappingURL` comment on its own line
pub fn append_reference(code: &mut String, url: &str) {
    if !code.is_empty() && !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str(SOURCE_MAP_MARKER);
    code.push_str(url);
}
