//! Turning bundler results into buffered output files

use crate::bundler::{Artifact, Generated};
use crate::error::BuildError;
use crate::options::{OutputTarget, SourceMapMode};
use crate::sourcemap::append_reference;
use rollcache_output::OutputPatcher;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Buffer every generated file for its target
///
/// Results are matched to targets by position.
pub(crate) fn emit(
    output: &mut OutputPatcher,
    targets: &[OutputTarget],
    generated: Vec<Generated>,
) -> Result<(), BuildError> {
    if generated.len() != targets.len() {
        return Err(BuildError::TargetMismatch {
            expected: targets.len(),
            actual: generated.len(),
        });
    }

    for (index, (target, generated)) in targets.iter().zip(generated).enumerate() {
        match generated {
            Generated::Single(artifact) => {
                let file = target.file.as_deref().ok_or(BuildError::TargetShape {
                    index,
                    needed: "file",
                    shape: "single file",
                })?;
                write_artifact(output, file, target.sourcemap, artifact)?;
            }
            Generated::Chunks(chunks) => {
                let dir = target.dir.as_deref().ok_or(BuildError::TargetShape {
                    index,
                    needed: "dir",
                    shape: "chunks",
                })?;
                for (name, artifact) in chunks {
                    write_artifact(output, &dir.join(name), target.sourcemap, artifact)?;
                }
            }
        }
    }
    Ok(())
}

fn write_artifact(
    output: &mut OutputPatcher,
    path: &Path,
    mode: SourceMapMode,
    artifact: Artifact,
) -> Result<(), BuildError> {
    let Artifact { mut code, map } = artifact;

    if let Some(map) = map.filter(|_| mode.is_enabled()) {
        let url = match mode {
            SourceMapMode::Inline => map.to_url()?,
            _ => {
                let map_path = map_path(path);
                output.add(&map_path, map.to_json()?)?;
                file_name(&map_path)
            }
        };
        append_reference(&mut code, &url);
    }

    output.add(path, code)?;
    Ok(())
}

/// `<path>.map`
fn map_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".map");
    PathBuf::from(name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
