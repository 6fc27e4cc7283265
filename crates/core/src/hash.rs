//! BLAKE3 content fingerprints for tree snapshots

use serde::{Deserialize, Serialize};
use std::fs::{File, Metadata};
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// How file entries are fingerprinted when a directory is scanned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// Hash the full file contents (exact, reads every file)
    #[default]
    Content,
    /// Hash size + modification time (cheap, may miss same-size rewrites
    /// within the filesystem's mtime granularity)
    Metadata,
}

/// Opaque fingerprint of a file entry (32-byte BLAKE3 digest)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Create a fingerprint from raw digest bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the digest as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let mut hex = String::with_capacity(64);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Fingerprint an in-memory buffer
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint::from_bytes(*blake3::hash(data).as_bytes())
}

/// Fingerprint a file's contents (streaming, 8KB buffer)
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint::from_bytes(*hasher.finalize().as_bytes()))
}

/// Fingerprint a file from its size and modification time only
pub fn fingerprint_metadata(metadata: &Metadata) -> io::Result<Fingerprint> {
    let mtime = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(&metadata.len().to_le_bytes());
    hasher.update(&mtime.as_secs().to_le_bytes());
    hasher.update(&mtime.subsec_nanos().to_le_bytes());
    Ok(Fingerprint::from_bytes(*hasher.finalize().as_bytes()))
}

/// Fingerprint a file at `path` according to `mode`
pub fn fingerprint_path(path: &Path, metadata: &Metadata, mode: FingerprintMode) -> io::Result<Fingerprint> {
    match mode {
        FingerprintMode::Content => fingerprint_file(path),
        FingerprintMode::Metadata => fingerprint_metadata(metadata),
    }
}
