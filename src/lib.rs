//! # Diffspot - Fingerprint a directory tree, spot what changed
//!
//! Diffspot produces a manifest of every regular file under a directory, one
//! `path,digest` line per file, and compares two such manifests to report
//! which files were added, removed or modified in between.
//!
//! ## Overview
//!
//! A typical use is change detection on a host:
//! - Take a manifest of `/etc` before a package upgrade
//! - Take another one afterwards
//! - Compare them; every `-`/`+` pair is a file whose content changed
//!
//! ## Architecture
//!
//! - **Hashing engine** ([`generate`]): a sorted, symlink-free walk of the
//!   location. Contents are streamed through a SHA-2 digest in 64 KiB blocks
//!   and records are written in traversal order, optionally hashed by a
//!   bounded rayon pool.
//! - **Comparator** ([`compare`]): a line diff of two manifests built on a
//!   Myers matcher ([`diff`]) in either a full layout with intraline hints or
//!   a unified layout with hunks.
//! - **Driver** ([`run`]): precondition checks, output file handling and
//!   dispatch on a validated [`RunMode`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use diffspot::{run, RunMode, RunOutcome, RunRequest, ProgressInfo};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = RunRequest {
//!     generate: Some(PathBuf::from("/tmp/before.csv")),
//!     location: Some(PathBuf::from("/etc")),
//!     ..Default::default()
//! };
//! let mode = RunMode::try_from(request)?;
//! let outcome = run::<fn(ProgressInfo)>(&mode, None)?;
//! if let RunOutcome::Generated(stats) = outcome {
//!     println!("hashed {} files", stats.files_processed);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Comparing in memory, without any files:
//!
//! ```rust
//! use diffspot::{compare_lines, DiffOptions};
//!
//! let before = ["/a,1", "/b,2"];
//! let after = ["/a,1", "/b,3"];
//! let comparison = compare_lines(&before, &after, &DiffOptions::default());
//! assert_eq!(comparison.rendered(), vec!["- /b,2", "+ /b,3"]);
//! assert_eq!(comparison.stats.difference_count, 1);
//! ```
//!
//! ## Manifest Format
//!
//! UTF-8 text, one record per line terminated by `\n`:
//!
//! ```text
//! /etc/hosts,2d7ab1e2...
//! /etc/shadow,
//! ```
//!
//! The digest is lowercase hex. An empty digest marks a file that could not
//! be read while permission errors were being ignored. Paths are written
//! verbatim and may themselves contain commas, so parsers split on the last
//! one ([`ManifestRecord::parse`]).
//!
//! ## Module Organization
//!
//! - [`digest`]: streaming content digests
//! - [`record`]: the manifest line format
//! - [`generate`]: directory traversal and manifest generation
//! - [`diff`]: sequence matching primitives
//! - [`compare`]: manifest comparison and rendering
//! - [`run`]: validated entry points used by the command line
//! - [`types`]: options, modes and statistics
//! - [`error`]: error types and handling

pub mod compare;
pub mod diff;
pub mod digest;
pub mod error;
pub mod generate;
pub mod record;
pub mod run;
pub mod types;

// Re-export main types for convenience
pub use compare::{compare_lines, Comparison, DiffLine, LineTag};
pub use digest::DigestAlgorithm;
pub use error::{DiffspotError, Result};
pub use generate::ManifestGenerator;
pub use record::ManifestRecord;
pub use run::{compare_manifests, generate_manifest, run, RunOutcome};
pub use types::*;
