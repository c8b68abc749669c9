//! Core data types shared by the hashing engine, the comparator and the driver
//!
//! The types in this module represent:
//! - **Run selection**: [`RunRequest`] (raw, possibly inconsistent flags) and
//!   [`RunMode`] (validated, one variant per operating mode)
//! - **Comparison policy**: [`DiffStyle`], [`FilterMode`], [`DiffOptions`]
//! - **Results**: [`HashStats`], [`CompareStats`], [`RunStats`]
//! - **Progress**: [`ProgressInfo`]
//!
//! ## Examples
//!
//! ```rust
//! use diffspot::types::{RunMode, RunRequest};
//! use std::path::PathBuf;
//!
//! let request = RunRequest {
//!     generate: Some(PathBuf::from("/tmp/before.csv")),
//!     location: Some(PathBuf::from("/etc")),
//!     ..Default::default()
//! };
//! let mode = RunMode::try_from(request).unwrap();
//! assert!(matches!(mode, RunMode::Generate(_)));
//! ```

use crate::digest::DigestAlgorithm;
use crate::error::{DiffspotError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the comparison is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStyle {
    /// Every line tagged `+ `, `- `, `  ` or `? `
    #[default]
    Full,
    /// Hunks with `---`/`+++`/`@@` headers
    Unified,
}

/// Which lines of the comparison are kept in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    /// Only what changed
    #[default]
    DifferencesOnly,
    /// Changes plus every unchanged line
    IncludeMatches,
    /// Only unchanged lines
    OnlyMatches,
}

impl FilterMode {
    /// Resolve the two mutually exclusive command-line switches
    pub fn from_flags(include_matches: bool, only_matches: bool) -> Result<Self> {
        match (include_matches, only_matches) {
            (true, true) => Err(DiffspotError::invalid_configuration(
                "--include-matches and --only-matches are mutually exclusive",
            )),
            (true, false) => Ok(FilterMode::IncludeMatches),
            (false, true) => Ok(FilterMode::OnlyMatches),
            (false, false) => Ok(FilterMode::DifferencesOnly),
        }
    }
}

/// Comparison policy plus the names printed in unified headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Output layout
    pub style: DiffStyle,
    /// Output filter
    pub filter: FilterMode,
    /// Name shown after `---`
    pub from_label: String,
    /// Name shown after `+++`
    pub to_label: String,
}

/// Settings of a manifest generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Manifest file to write
    pub output: PathBuf,
    /// Directory to fingerprint
    pub location: PathBuf,
    /// Truncate `output` if it exists
    pub overwrite: bool,
    /// Accept a relative `location`
    pub allow_relative: bool,
    /// Record unreadable files with an empty digest instead of aborting
    pub ignore_permission_errors: bool,
    /// Digest used for file contents
    pub algorithm: DigestAlgorithm,
    /// Hashing workers; 0 means one per CPU
    pub parallel_workers: usize,
}

/// Settings of a manifest comparison run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    /// Result file to write
    pub output: PathBuf,
    /// Earlier manifest
    pub before: PathBuf,
    /// Later manifest
    pub after: PathBuf,
    /// Truncate `output` if it exists
    pub overwrite: bool,
    /// Output layout
    pub style: DiffStyle,
    /// Output filter
    pub filter: FilterMode,
}

impl CompareOptions {
    /// Diff policy labelled with the input file names
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            style: self.style,
            filter: self.filter,
            from_label: self.before.to_string_lossy().into_owned(),
            to_label: self.after.to_string_lossy().into_owned(),
        }
    }
}

/// Unvalidated flags of one invocation, as the command line delivers them
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Manifest to generate
    pub generate: Option<PathBuf>,
    /// Comparison result to write
    pub compare: Option<PathBuf>,
    /// Directory to fingerprint
    pub location: Option<PathBuf>,
    /// Earlier manifest
    pub before: Option<PathBuf>,
    /// Later manifest
    pub after: Option<PathBuf>,
    /// Truncate existing output
    pub overwrite: bool,
    /// Accept a relative location
    pub ignore_fullpath: bool,
    /// Empty digest for unreadable files
    pub ignore_permission: bool,
    /// Unified layout instead of full
    pub unified_diff: bool,
    /// Keep unchanged lines too
    pub include_matches: bool,
    /// Keep unchanged lines only
    pub only_matches: bool,
    /// Digest used for file contents
    pub algorithm: DigestAlgorithm,
    /// Hashing workers; 0 means one per CPU
    pub jobs: usize,
}

/// Validated operating mode; exactly one engine runs per invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Fingerprint a directory into a manifest
    Generate(GenerateOptions),
    /// Compare two manifests
    Compare(CompareOptions),
}

impl TryFrom<RunRequest> for RunMode {
    type Error = DiffspotError;

    fn try_from(req: RunRequest) -> Result<Self> {
        match (req.generate, req.compare) {
            (Some(_), Some(_)) => Err(DiffspotError::invalid_configuration(
                "--generate and --compare are mutually exclusive",
            )),
            (None, None) => Err(DiffspotError::invalid_configuration(
                "one of --generate or --compare is required",
            )),
            (Some(output), None) => {
                if req.before.is_some() || req.after.is_some() {
                    return Err(DiffspotError::invalid_configuration(
                        "--before/--after only apply to --compare",
                    ));
                }
                let location = req.location.ok_or_else(|| {
                    DiffspotError::invalid_configuration("--generate requires --location")
                })?;
                Ok(RunMode::Generate(GenerateOptions {
                    output,
                    location,
                    overwrite: req.overwrite,
                    allow_relative: req.ignore_fullpath,
                    ignore_permission_errors: req.ignore_permission,
                    algorithm: req.algorithm,
                    parallel_workers: req.jobs,
                }))
            }
            (None, Some(output)) => {
                if req.location.is_some() {
                    return Err(DiffspotError::invalid_configuration(
                        "--location only applies to --generate",
                    ));
                }
                let filter = FilterMode::from_flags(req.include_matches, req.only_matches)?;
                match (req.before, req.after) {
                    (Some(before), Some(after)) => Ok(RunMode::Compare(CompareOptions {
                        output,
                        before,
                        after,
                        overwrite: req.overwrite,
                        style: if req.unified_diff { DiffStyle::Unified } else { DiffStyle::Full },
                        filter,
                    })),
                    (before, after) => Err(DiffspotError::MissingComparisonInput {
                        before: before.is_some(),
                        after: after.is_some(),
                    }),
                }
            }
        }
    }
}

/// Progress information for long-running operations
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Current operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Number of items processed so far
    pub processed: usize,
    /// Bytes processed so far
    pub bytes_processed: u64,
}

/// Counters of one generation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStats {
    /// Records written, including empty-digest ones
    pub files_processed: usize,
    /// Files whose content was hashed
    pub files_hashed: usize,
    /// Files recorded with an empty digest
    pub permission_denied: usize,
    /// Bytes fed to the digest
    pub bytes_hashed: u64,
    /// Wall-clock time of the run
    pub duration: Duration,
}

/// Counters of one comparison run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareStats {
    /// Larger of the two manifests' line counts
    pub files_processed: usize,
    /// Larger of `added` and `removed`
    pub difference_count: usize,
    /// Lines only in the later manifest
    pub added: usize,
    /// Lines only in the earlier manifest
    pub removed: usize,
    /// Lines written to the result file
    pub lines_written: usize,
    /// Wall-clock time of the run
    pub duration: Duration,
}

/// Counters of whichever engine ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunStats {
    /// Result of a generation run
    Generate(HashStats),
    /// Result of a comparison run
    Compare(CompareStats),
}

impl RunStats {
    /// Files considered by the run
    pub fn files_processed(&self) -> usize {
        match self {
            RunStats::Generate(s) => s.files_processed,
            RunStats::Compare(s) => s.files_processed,
        }
    }

    /// Wall-clock time of the run
    pub fn duration(&self) -> Duration {
        match self {
            RunStats::Generate(s) => s.duration,
            RunStats::Compare(s) => s.duration,
        }
    }
}
