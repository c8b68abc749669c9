//! Entry points that validate a run and drive one engine
//!
//! Every fatal precondition is checked before the first byte is written:
//!
//! | check | error |
//! |-------|-------|
//! | location exists and is a directory | [`DiffspotError::LocationNotFound`] |
//! | location is absolute (unless allowed) | [`DiffspotError::RelativePathRejected`] |
//! | both comparison inputs exist | [`DiffspotError::MissingComparisonInput`] |
//! | output absent (unless overwriting) | [`DiffspotError::OutputAlreadyExists`] |

use crate::compare::{compare_lines, read_manifest_lines, write_comparison, Comparison};
use crate::error::{DiffspotError, Result};
use crate::generate::ManifestGenerator;
use crate::types::{CompareOptions, GenerateOptions, HashStats, ProgressInfo, RunMode, RunStats};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// What a finished run produced
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// A manifest was written
    Generated(HashStats),
    /// A comparison was written
    Compared(Comparison),
}

impl RunOutcome {
    /// Counters of the run
    pub fn stats(&self) -> RunStats {
        match self {
            RunOutcome::Generated(stats) => RunStats::Generate(stats.clone()),
            RunOutcome::Compared(comparison) => RunStats::Compare(comparison.stats.clone()),
        }
    }
}

/// Run whichever engine `mode` selects
pub fn run<F>(mode: &RunMode, progress_callback: Option<F>) -> Result<RunOutcome>
where
    F: Fn(ProgressInfo),
{
    match mode {
        RunMode::Generate(opts) => generate_manifest(opts, progress_callback).map(RunOutcome::Generated),
        RunMode::Compare(opts) => compare_manifests(opts).map(RunOutcome::Compared),
    }
}

/// Fingerprint `opts.location` into `opts.output`
///
/// The output file itself is never recorded, even when it lies inside the
/// location.
pub fn generate_manifest<F>(opts: &GenerateOptions, progress_callback: Option<F>) -> Result<HashStats>
where
    F: Fn(ProgressInfo),
{
    let start = Instant::now();

    if !opts.location.is_dir() {
        return Err(DiffspotError::LocationNotFound(opts.location.clone()));
    }
    if opts.location.is_relative() && !opts.allow_relative {
        return Err(DiffspotError::RelativePathRejected(opts.location.clone()));
    }
    ensure_output_available(&opts.output, opts.overwrite)?;

    let mut sink = BufWriter::new(open_output(&opts.output, opts.overwrite)?);
    let generator = ManifestGenerator::new(opts.location.clone())
        .with_algorithm(opts.algorithm)
        .with_ignore_permission_errors(opts.ignore_permission_errors)
        .with_parallel_workers(opts.parallel_workers)
        .with_excluded_path(opts.output.clone());

    let mut stats = generator.generate(&mut sink, progress_callback)?;
    sink.flush()?;
    stats.duration = start.elapsed();

    info!(
        "Wrote manifest {:?}: {} records from {:?}",
        opts.output, stats.files_processed, opts.location
    );
    Ok(stats)
}

/// Compare `opts.before` with `opts.after` and write the result to `opts.output`
pub fn compare_manifests(opts: &CompareOptions) -> Result<Comparison> {
    let start = Instant::now();

    let before_found = opts.before.is_file();
    let after_found = opts.after.is_file();
    if !(before_found && after_found) {
        return Err(DiffspotError::MissingComparisonInput {
            before: before_found,
            after: after_found,
        });
    }
    ensure_output_available(&opts.output, opts.overwrite)?;

    // Read both inputs before touching the output, which may be one of them.
    let before = read_manifest_lines(&opts.before)?;
    let after = read_manifest_lines(&opts.after)?;
    let mut comparison = compare_lines(&before, &after, &opts.diff_options());

    let mut sink = BufWriter::new(open_output(&opts.output, opts.overwrite)?);
    write_comparison(&mut sink, &comparison)?;
    sink.flush()?;
    comparison.stats.duration = start.elapsed();

    info!(
        "Wrote comparison {:?}: {} differences over {} records",
        opts.output, comparison.stats.difference_count, comparison.stats.files_processed
    );
    Ok(comparison)
}

fn ensure_output_available(path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(DiffspotError::OutputAlreadyExists(path.to_path_buf()));
    }
    Ok(())
}

/// Open the destination file, truncating it only when overwriting
///
/// Without `overwrite` the file is created exclusively, so a file appearing
/// after the up-front check is still never clobbered.
pub fn open_output(path: &Path, overwrite: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    options.open(path).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            DiffspotError::OutputAlreadyExists(path.to_path_buf())
        } else {
            DiffspotError::Io(e)
        }
    })
}
