//! # Diffspot CLI - Spot file changes between two points in time
//!
//! ## Usage
//! ```bash
//! # Fingerprint /etc before an upgrade
//! diffspot -g /tmp/before.csv -l /etc
//!
//! # ...and afterwards
//! diffspot -g /tmp/after.csv -l /etc
//!
//! # Report what changed
//! diffspot -c /tmp/changes.txt -b /tmp/before.csv -a /tmp/after.csv -v
//! ```
//!
//! ## Exit codes
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | location not found |
//! | 2 | relative location rejected |
//! | 3 | output already exists |
//! | 4 | missing comparison input |
//! | 13 | permission denied |
//! | 64 | invalid command line |
//! | 74 | other I/O failure |

use clap::{ArgGroup, Parser};
use colored::*;
use diffspot::{
    run, DiffspotError, DigestAlgorithm, LineTag, ProgressInfo, Result, RunMode, RunOutcome,
    RunRequest, RunStats,
};
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXIT_LOCATION_NOT_FOUND: i32 = 1;
const EXIT_RELATIVE_PATH: i32 = 2;
const EXIT_OUTPUT_EXISTS: i32 = 3;
const EXIT_MISSING_INPUT: i32 = 4;
const EXIT_PERMISSION_DENIED: i32 = 13;
const EXIT_USAGE: i32 = 64;
const EXIT_IO: i32 = 74;

/// Diffspot CLI - Hash every file under a directory and compare the results
#[derive(Parser)]
#[command(name = "diffspot")]
#[command(version)]
#[command(about = "Fingerprint a directory tree and spot what changed between two fingerprints")]
#[command(long_about = None)]
#[command(group(ArgGroup::new("action").required(true).args(["generate", "compare"])))]
struct Cli {
    /// Write a manifest of --location to FILE
    #[arg(short, long, value_name = "FILE")]
    generate: Option<PathBuf>,

    /// Write the comparison of --before and --after to FILE
    #[arg(short, long, value_name = "FILE")]
    compare: Option<PathBuf>,

    /// Directory to fingerprint
    #[arg(short, long, value_name = "DIR")]
    location: Option<PathBuf>,

    /// Accept a relative --location
    #[arg(long)]
    ignore_fullpath: bool,

    /// Record unreadable files with an empty digest instead of aborting
    #[arg(long)]
    ignore_permission: bool,

    /// Earlier manifest
    #[arg(short, long, value_name = "FILE")]
    before: Option<PathBuf>,

    /// Later manifest
    #[arg(short, long, value_name = "FILE")]
    after: Option<PathBuf>,

    /// Replace the output file if it exists
    #[arg(short, long)]
    overwrite: bool,

    /// Print nothing but the result file
    #[arg(short, long)]
    quiet: bool,

    /// Echo the comparison and log progress
    #[arg(short, long)]
    verbose: bool,

    /// Write the comparison as a unified diff
    #[arg(short, long)]
    unified_diff: bool,

    /// Keep unchanged lines as well
    #[arg(long, conflicts_with = "only_matches")]
    include_matches: bool,

    /// Keep only unchanged lines
    #[arg(long)]
    only_matches: bool,

    /// Digest used for file contents
    #[arg(long, value_enum, default_value = "sha224")]
    algorithm: DigestAlgorithm,

    /// Hashing workers (0 = one per CPU)
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Show a spinner while hashing
    #[arg(long)]
    progress: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also come through here, on stdout
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Set up logging
    if !cli.quiet {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let quiet = cli.quiet;
    if let Err(e) = run_cli(cli) {
        if !quiet {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        }
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(err: &DiffspotError) -> i32 {
    match err {
        DiffspotError::LocationNotFound(_) => EXIT_LOCATION_NOT_FOUND,
        DiffspotError::RelativePathRejected(_) => EXIT_RELATIVE_PATH,
        DiffspotError::OutputAlreadyExists(_) => EXIT_OUTPUT_EXISTS,
        DiffspotError::MissingComparisonInput { .. } => EXIT_MISSING_INPUT,
        DiffspotError::PermissionDenied { .. } => EXIT_PERMISSION_DENIED,
        DiffspotError::InvalidConfiguration(_) => EXIT_USAGE,
        _ => EXIT_IO,
    }
}

/// Validate the flags, run one engine and report
fn run_cli(cli: Cli) -> Result<()> {
    let verbose = cli.verbose && !cli.quiet;
    let request = RunRequest {
        generate: cli.generate,
        compare: cli.compare,
        location: cli.location,
        before: cli.before,
        after: cli.after,
        overwrite: cli.overwrite,
        ignore_fullpath: cli.ignore_fullpath,
        ignore_permission: cli.ignore_permission,
        unified_diff: cli.unified_diff,
        include_matches: cli.include_matches,
        only_matches: cli.only_matches,
        algorithm: cli.algorithm,
        jobs: cli.jobs,
    };
    let mode = RunMode::try_from(request)?;

    let spinner = match &mode {
        RunMode::Generate(_) if cli.progress && !cli.quiet => Some(create_spinner()),
        _ => None,
    };
    let callback = spinner.clone().map(|pb| {
        move |info: ProgressInfo| {
            pb.set_position(info.processed as u64);
            if let Some(item) = info.current_item {
                pb.set_message(item);
            }
        }
    });

    let outcome = run(&mode, callback);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let outcome = outcome?;

    if verbose {
        if let RunOutcome::Compared(comparison) = &outcome {
            print_comparison(comparison);
        }
    }

    if !cli.quiet {
        print_summary(&outcome.stats(), cli.json)?;
    }
    Ok(())
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Echo the lines written to the result file
fn print_comparison(comparison: &diffspot::Comparison) {
    println!("{}", "Compare results:".blue().bold());
    if comparison.is_empty() {
        println!("Nothing to report.");
        return;
    }

    for line in &comparison.lines {
        let text = line.render(comparison.style);
        match line.tag {
            LineTag::Added => println!("{}", text.green()),
            LineTag::Removed => println!("{}", text.red()),
            LineTag::Common => println!("{}", text),
            LineTag::Annotation(_) => println!("{}", text.cyan()),
        }
    }
}

fn print_summary(stats: &RunStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    // Sub-millisecond noise only clutters the message
    let elapsed = format_duration(Duration::from_millis(stats.duration().as_millis() as u64));
    match stats {
        RunStats::Generate(s) => {
            println!(
                "\nDiffspot took {} to hash {} files.",
                elapsed.to_string().cyan(),
                s.files_processed.to_string().yellow().bold()
            );
            if s.permission_denied > 0 {
                println!(
                    "  {} files recorded with an empty digest",
                    s.permission_denied.to_string().yellow()
                );
            }
        }
        RunStats::Compare(s) => {
            println!(
                "\nDiffspot took {} to compare at least {} files and found at least {} differences.",
                elapsed.to_string().cyan(),
                s.files_processed.to_string().yellow().bold(),
                s.difference_count.to_string().yellow().bold()
            );
        }
    }
    Ok(())
}
