//! Error types for output reconciliation

use std::path::PathBuf;

/// Errors raised while buffering or committing generated output
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// An output path was absolute or escaped the output directory
    #[error("invalid output path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// A write, rename, or removal in the output directory failed
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = OutputError::Io {
            action: "write",
            path: PathBuf::from("dist/out.js"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(err.to_string(), "failed to write dist/out.js: disk full");
    }
}
