//! Directory hashing engine
//!
//! Walks a directory tree and writes one `path,digest` record per regular file
//! to a sink, as soon as the digest is known. The manifest is never held in
//! memory, so trees of any size can be fingerprinted.
//!
//! ## Traversal
//!
//! - Depth-first, entries sorted by file name inside each directory, so two
//!   runs over an unchanged tree produce byte-identical manifests
//! - Symbolic links are never followed
//! - Only regular files produce records; directories, symlinks, sockets,
//!   FIFOs and device nodes are skipped without being counted
//!
//! ## Permission errors
//!
//! A file (or directory) that cannot be read because of its permissions either
//! aborts the whole run with [`DiffspotError::PermissionDenied`], or, when
//! configured with [`ManifestGenerator::with_ignore_permission_errors`], is
//! recorded with an empty digest (directories are skipped) and the walk goes on.
//! On abort, records already written stay in the sink; nothing after the failing
//! file is written.
//!
//! ## Parallel hashing
//!
//! With more than one worker, regular files are gathered in bounded batches,
//! hashed on a `rayon` pool, and written back in traversal order by the calling
//! thread. The output is identical to a single-worker run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use diffspot::generate::ManifestGenerator;
//! use diffspot::types::ProgressInfo;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut out = Vec::new();
//! let stats = ManifestGenerator::new(PathBuf::from("/etc"))
//!     .with_ignore_permission_errors(true)
//!     .with_parallel_workers(4)
//!     .generate::<_, fn(ProgressInfo)>(&mut out, None)?;
//! println!("{} files", stats.files_processed);
//! # Ok(())
//! # }
//! ```

use crate::digest::{hash_file, DigestAlgorithm};
use crate::error::{DiffspotError, Result};
use crate::record::ManifestRecord;
use crate::types::{HashStats, ProgressInfo};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::ffi::OsString;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Files handed to each worker per batch
const FILES_PER_WORKER: usize = 32;

/// Manifest generator for one directory tree
#[derive(Debug, Clone)]
pub struct ManifestGenerator {
    /// Root directory to walk
    root: PathBuf,
    /// Digest used for file contents
    algorithm: DigestAlgorithm,
    /// Record unreadable files instead of aborting
    ignore_permission_errors: bool,
    /// Number of hashing workers
    parallel_workers: usize,
    /// File never recorded, typically the manifest being written
    excluded: Option<PathBuf>,
}

/// A regular file waiting for its digest
struct Candidate {
    path: PathBuf,
    size: u64,
}

/// The excluded file, resolved once per run
struct Exclusion {
    file_name: OsString,
    canonical: PathBuf,
}

impl Exclusion {
    fn resolve(path: &Path) -> Option<Self> {
        let canonical = path.canonicalize().ok()?;
        let file_name = canonical.file_name()?.to_os_string();
        Some(Self { file_name, canonical })
    }

    fn matches(&self, path: &Path) -> bool {
        // Only canonicalize paths whose name could match.
        path.file_name() == Some(self.file_name.as_os_str())
            && path.canonicalize().is_ok_and(|p| p == self.canonical)
    }
}

impl ManifestGenerator {
    /// Create a generator with default settings
    ///
    /// Defaults: SHA-224, permission errors abort the run, a single worker,
    /// nothing excluded.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            algorithm: DigestAlgorithm::default(),
            ignore_permission_errors: false,
            parallel_workers: 1,
            excluded: None,
        }
    }

    /// Set the digest algorithm
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Record unreadable files with an empty digest instead of aborting
    pub fn with_ignore_permission_errors(mut self, ignore: bool) -> Self {
        self.ignore_permission_errors = ignore;
        self
    }

    /// Set number of hashing workers
    ///
    /// `0` uses one worker per CPU core.
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = if workers == 0 { num_cpus::get() } else { workers };
        self
    }

    /// Never record `path`, even when it lies inside the walked tree
    pub fn with_excluded_path(mut self, path: PathBuf) -> Self {
        self.excluded = Some(path);
        self
    }

    /// Walk the tree and write the manifest to `sink`
    ///
    /// # Errors
    ///
    /// - [`DiffspotError::PermissionDenied`] on the first unreadable file or
    ///   directory, unless permission errors are ignored
    /// - [`DiffspotError::WalkDir`] / [`DiffspotError::Io`] on any other
    ///   traversal, read or write failure
    pub fn generate<W, F>(&self, sink: &mut W, progress_callback: Option<F>) -> Result<HashStats>
    where
        W: Write + ?Sized,
        F: Fn(ProgressInfo),
    {
        let start = Instant::now();
        let mut stats = HashStats::default();
        let exclusion = self.excluded.as_deref().and_then(Exclusion::resolve);

        let pool = if self.parallel_workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.parallel_workers)
                    .build()?,
            )
        } else {
            None
        };
        let batch_size = if pool.is_some() {
            self.parallel_workers * FILES_PER_WORKER
        } else {
            1
        };
        debug!(
            "Hashing {:?} with {} ({} worker(s))",
            self.root, self.algorithm, self.parallel_workers
        );

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name();

        let mut batch: Vec<Candidate> = Vec::with_capacity(batch_size);
        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    self.handle_walk_error(e)?;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                trace!("Skipping non-regular entry {:?}", entry.path());
                continue;
            }
            if exclusion.as_ref().is_some_and(|ex| ex.matches(entry.path())) {
                debug!("Skipping output file {:?}", entry.path());
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            batch.push(Candidate {
                path: entry.into_path(),
                size,
            });
            if batch.len() >= batch_size {
                self.flush_batch(&mut batch, pool.as_ref(), sink, &mut stats, progress_callback.as_ref())?;
            }
        }
        self.flush_batch(&mut batch, pool.as_ref(), sink, &mut stats, progress_callback.as_ref())?;

        stats.duration = start.elapsed();
        debug!(
            "Hashed {} files ({} bytes, {} unreadable) in {:?}",
            stats.files_hashed, stats.bytes_hashed, stats.permission_denied, stats.duration
        );

        Ok(stats)
    }

    /// Unreadable directories follow the permission policy; anything else is fatal
    fn handle_walk_error(&self, err: walkdir::Error) -> Result<()> {
        let denied = err
            .io_error()
            .is_some_and(|e| e.kind() == ErrorKind::PermissionDenied);
        if !denied {
            return Err(err.into());
        }

        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        if self.ignore_permission_errors {
            warn!("Skipping unreadable directory {:?}", path);
            Ok(())
        } else {
            Err(DiffspotError::PermissionDenied { path })
        }
    }

    /// Hash a batch and write its records in traversal order
    fn flush_batch<W, F>(
        &self,
        batch: &mut Vec<Candidate>,
        pool: Option<&ThreadPool>,
        sink: &mut W,
        stats: &mut HashStats,
        progress_callback: Option<&F>,
    ) -> Result<()>
    where
        W: Write + ?Sized,
        F: Fn(ProgressInfo),
    {
        if batch.is_empty() {
            return Ok(());
        }

        let algorithm = self.algorithm;
        let digests: Vec<Result<String>> = match pool {
            Some(pool) => pool.install(|| {
                batch
                    .par_iter()
                    .map(|c| hash_file(algorithm, &c.path))
                    .collect()
            }),
            None => batch.iter().map(|c| hash_file(algorithm, &c.path)).collect(),
        };

        for (candidate, digest) in batch.drain(..).zip(digests) {
            let record = match digest {
                Ok(digest) => {
                    stats.files_hashed += 1;
                    stats.bytes_hashed += candidate.size;
                    ManifestRecord::new(&candidate.path, digest)
                }
                Err(DiffspotError::PermissionDenied { path }) if self.ignore_permission_errors => {
                    warn!("Missing read permission for {:?}, recording empty digest", path);
                    stats.permission_denied += 1;
                    ManifestRecord::unreadable(&path)
                }
                Err(e) => return Err(e),
            };

            record.write_line(sink)?;
            stats.files_processed += 1;

            if let Some(callback) = progress_callback {
                callback(ProgressInfo {
                    operation: "Hashing files".to_string(),
                    current_item: Some(record.path),
                    processed: stats.files_processed,
                    bytes_processed: stats.bytes_hashed,
                });
            }
        }

        Ok(())
    }
}
