//! Error types for diffspot
//!
//! Every fatal condition of a run maps to one variant here, so the driver can
//! tell "the location is missing" apart from "a file was unreadable" without
//! inspecting messages. Only [`DiffspotError::PermissionDenied`] has a local
//! recovery path (the ignore-permission flag of the hashing engine).

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the diffspot library
pub type Result<T> = std::result::Result<T, DiffspotError>;

/// Main error type for all diffspot operations
#[derive(Debug, Error)]
pub enum DiffspotError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Traversal root does not exist
    #[error("Location not found: {0:?}")]
    LocationNotFound(PathBuf),

    /// Traversal root is relative and the override flag is absent
    #[error("Relative location rejected: {0:?}")]
    RelativePathRejected(PathBuf),

    /// Destination file exists and overwriting was not requested
    #[error("Output already exists: {0:?}")]
    OutputAlreadyExists(PathBuf),

    /// A file could not be read because of its permissions
    #[error("Permission denied: {path:?}")]
    PermissionDenied {
        /// Path where permission was denied
        path: PathBuf,
    },

    /// One or both comparison inputs were not supplied
    #[error("Missing comparison input (before: {before}, after: {after})")]
    MissingComparisonInput {
        /// Whether the earlier manifest was supplied
        before: bool,
        /// Whether the later manifest was supplied
        after: bool,
    },

    /// A manifest line could not be parsed as a record
    #[error("Malformed manifest record at line {line}: {content:?}")]
    MalformedRecord {
        /// 1-based line number
        line: usize,
        /// Offending line
        content: String,
    },

    /// Serialization error while rendering run statistics
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for DiffspotError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        DiffspotError::ThreadPool(err.to_string())
    }
}

impl DiffspotError {
    /// Create an invalid-configuration error with a custom message
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DiffspotError::InvalidConfiguration(msg.into())
    }

    /// Map an I/O error raised while reading `path` to a permission error
    /// when that is what it is
    pub fn from_read_error(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            DiffspotError::PermissionDenied { path: path.into() }
        } else {
            DiffspotError::Io(err)
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            DiffspotError::LocationNotFound(path) => {
                format!("Folder {} not found.", path.display())
            }
            DiffspotError::RelativePathRejected(path) => {
                format!(
                    "Don't use relative paths ({}) or specify --ignore-fullpath",
                    path.display()
                )
            }
            DiffspotError::OutputAlreadyExists(path) => {
                format!(
                    "File {} already exists. Use -o or --overwrite or pick a different file name.",
                    path.display()
                )
            }
            DiffspotError::PermissionDenied { path } => {
                format!(
                    "Missing read permission while reading {}. Use --ignore-permission to record it with an empty digest.",
                    path.display()
                )
            }
            DiffspotError::MissingComparisonInput { .. } => {
                "Missing one or both files for comparison. Use -b <file> -a <file>".to_string()
            }
            _ => self.to_string(),
        }
    }
}
