//! File duplication into the cache directory
//!
//! Mirrored files are always real copies, never links: the bundler must not
//! see edits to the input tree until the next patch is applied.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

const PROBE_SOURCE: &str = ".rollcache-probe";
const PROBE_TARGET: &str = ".rollcache-probe.copy";

/// Strategy used to copy a source file over its mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDuplicator {
    /// Remove the destination, exclusively create it, then stream the bytes
    Exclusive,
    /// Read the whole source into memory and write it over the destination
    ReadWrite,
}

impl FileDuplicator {
    /// Pick a strategy by probing `dir` once
    ///
    /// Falls back to [`FileDuplicator::ReadWrite`] if exclusive creation does
    /// not work in this directory.
    pub fn detect(dir: &Path) -> Self {
        let source = dir.join(PROBE_SOURCE);
        let target = dir.join(PROBE_TARGET);

        let result = fs::write(&source, b"probe")
            .and_then(|_| FileDuplicator::Exclusive.duplicate(&source, &target))
            .and_then(|_| FileDuplicator::Exclusive.duplicate(&source, &target));

        let _ = fs::remove_file(&source);
        let _ = fs::remove_file(&target);

        match result {
            Ok(()) => {
                debug!(dir = %dir.display(), "using exclusive-create file duplication");
                FileDuplicator::Exclusive
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "falling back to read-then-write file duplication");
                FileDuplicator::ReadWrite
            }
        }
    }

    /// Copy `src` to `dst`, replacing whatever is at `dst`
    pub fn duplicate(self, src: &Path, dst: &Path) -> io::Result<()> {
        match self {
            FileDuplicator::Exclusive => {
                remove_if_present(dst)?;
                let mut input = File::open(src)?;
                let mut output = OpenOptions::new().write(true).create_new(true).open(dst)?;
                io::copy(&mut input, &mut output)?;
                Ok(())
            }
            FileDuplicator::ReadWrite => {
                let content = fs::read(src)?;
                fs::write(dst, content)
            }
        }
    }
}

/// Remove a file, treating "already absent" as success
pub(crate) fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
