//! Streaming content digests
//!
//! Files are fed to a SHA-2 hasher in fixed 64 KiB blocks, so memory use does
//! not depend on file size. The digest is returned as lowercase hex.
//!
//! ```rust
//! use diffspot::digest::{hash_bytes, DigestAlgorithm};
//!
//! let hex = hash_bytes(DigestAlgorithm::Sha224, b"hello");
//! assert_eq!(hex.len(), DigestAlgorithm::Sha224.hex_len());
//! ```

use crate::error::{DiffspotError, Result};
use clap::ValueEnum;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Size of each block read from a file while hashing
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Hash function used to fingerprint file contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum DigestAlgorithm {
    /// SHA-224, 56 hex characters
    #[default]
    Sha224,
    /// SHA-256, 64 hex characters
    Sha256,
    /// SHA-384, 96 hex characters
    Sha384,
    /// SHA-512, 128 hex characters
    Sha512,
}

impl DigestAlgorithm {
    /// Length of the hex digest this algorithm produces
    pub fn hex_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha224 => 56,
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha384 => 96,
            DigestAlgorithm::Sha512 => 128,
        }
    }

    /// Lowercase name, as accepted by `--algorithm`
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha224 => "sha224",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hash everything `reader` yields, block by block
///
/// Interrupted reads are retried; any other read error is returned as is.
pub fn hash_reader<R: Read>(algorithm: DigestAlgorithm, reader: R) -> std::io::Result<String> {
    match algorithm {
        DigestAlgorithm::Sha224 => stream::<Sha224, R>(reader),
        DigestAlgorithm::Sha256 => stream::<Sha256, R>(reader),
        DigestAlgorithm::Sha384 => stream::<Sha384, R>(reader),
        DigestAlgorithm::Sha512 => stream::<Sha512, R>(reader),
    }
}

fn stream<D: Digest, R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash a file's content
///
/// # Errors
///
/// - [`DiffspotError::PermissionDenied`] if the file cannot be opened or read
///   because of its permissions
/// - [`DiffspotError::Io`] for every other I/O failure
pub fn hash_file(algorithm: DigestAlgorithm, path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| DiffspotError::from_read_error(e, path))?;
    hash_reader(algorithm, file).map_err(|e| DiffspotError::from_read_error(e, path))
}

/// Hash in-memory data
pub fn hash_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    // Reading from a slice cannot fail.
    hash_reader(algorithm, data).unwrap_or_default()
}
