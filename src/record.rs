//! Manifest record line format
//!
//! A manifest is plain text with one `path,digest` record per line. Commas in
//! paths are not escaped. Parsing splits at the last comma, which keeps the
//! digest intact, but manifests holding such paths should not be fed to tools
//! that split at the first comma.

use crate::error::{DiffspotError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// One `(path, digest)` line of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Path as encountered during traversal
    pub path: String,
    /// Lowercase hex digest, empty when the file was unreadable
    pub digest: String,
}

impl ManifestRecord {
    /// Record for a hashed file
    pub fn new(path: &Path, digest: impl Into<String>) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            digest: digest.into(),
        }
    }

    /// Record for a file that could not be read because of its permissions
    pub fn unreadable(path: &Path) -> Self {
        Self::new(path, String::new())
    }

    /// Whether this record marks a permission-denied file
    pub fn is_unreadable(&self) -> bool {
        self.digest.is_empty()
    }

    /// Parse one manifest line (without its terminator)
    ///
    /// `line_no` is 1-based and only used for the error.
    pub fn parse(line: &str, line_no: usize) -> Result<Self> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match line.rsplit_once(',') {
            Some((path, digest)) if !path.is_empty() => Ok(Self {
                path: path.to_string(),
                digest: digest.to_string(),
            }),
            _ => Err(DiffspotError::MalformedRecord {
                line: line_no,
                content: line.to_string(),
            }),
        }
    }

    /// Write this record followed by a newline
    pub fn write_line<W: Write + ?Sized>(&self, sink: &mut W) -> std::io::Result<()> {
        writeln!(sink, "{}", self)
    }
}

impl fmt::Display for ManifestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.path, self.digest)
    }
}

/// Parse a whole manifest, skipping blank lines
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| ManifestRecord::parse(line, i + 1))
        .collect()
}
