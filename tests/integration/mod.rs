//! Integration tests for diffspot
//!
//! Drives whole generate/compare runs against real directory trees,
//! including permission handling and special files.

use ::diffspot::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A watched tree plus a scratch area for manifests
pub struct DiffspotTestHarness {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub scratch: PathBuf,
}

impl DiffspotTestHarness {
    /// Create an empty watched tree
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        let scratch = temp_dir.path().join("scratch");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&scratch).unwrap();
        Self { temp_dir, root, scratch }
    }

    /// Write `content` to `rel` under the watched tree
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Path of a manifest or result file in the scratch area
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.scratch.join(name)
    }

    /// Generation request over the watched tree
    pub fn generate_request(&self, manifest: &str) -> RunRequest {
        RunRequest {
            generate: Some(self.scratch_file(manifest)),
            location: Some(self.root.clone()),
            ..Default::default()
        }
    }

    /// Generate a manifest with default settings
    pub fn generate(&self, manifest: &str) -> Result<HashStats> {
        self.generate_with(self.generate_request(manifest))
    }

    /// Generate a manifest from a customised request
    pub fn generate_with(&self, request: RunRequest) -> Result<HashStats> {
        let mode = RunMode::try_from(request)?;
        match run::<fn(ProgressInfo)>(&mode, None)? {
            RunOutcome::Generated(stats) => Ok(stats),
            RunOutcome::Compared(_) => panic!("expected a generation run"),
        }
    }

    /// Compare two scratch manifests into a scratch result file
    pub fn compare(&self, result: &str, before: &str, after: &str, tweak: impl FnOnce(&mut RunRequest)) -> Result<Comparison> {
        let mut request = RunRequest {
            compare: Some(self.scratch_file(result)),
            before: Some(self.scratch_file(before)),
            after: Some(self.scratch_file(after)),
            ..Default::default()
        };
        tweak(&mut request);
        let mode = RunMode::try_from(request)?;
        match run::<fn(ProgressInfo)>(&mode, None)? {
            RunOutcome::Compared(comparison) => Ok(comparison),
            RunOutcome::Generated(_) => panic!("expected a comparison run"),
        }
    }

    /// Lines of a scratch file
    pub fn read_lines(&self, name: &str) -> Vec<String> {
        fs::read_to_string(self.scratch_file(name))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Default for DiffspotTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn sha224(content: &str) -> String {
    digest::hash_bytes(DigestAlgorithm::Sha224, content.as_bytes())
}

fn record_line(path: &Path, content: &str) -> String {
    format!("{},{}", path.display(), sha224(content))
}

/// Make `path` unreadable; false when the current user can read it anyway
#[cfg(unix)]
fn revoke_read(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    let mode = if path.is_dir() { 0o000 } else { 0o200 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    if path.is_dir() {
        fs::read_dir(path).is_err()
    } else {
        fs::read(path).is_err()
    }
}

#[cfg(unix)]
fn restore_read(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_detects_modified_file() {
        let harness = DiffspotTestHarness::new();
        let a = harness.write("a.txt", "hello");
        let b = harness.write("b.txt", "world");

        let stats = harness.generate("before.csv").unwrap();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(
            harness.read_lines("before.csv"),
            vec![record_line(&a, "hello"), record_line(&b, "world")]
        );

        harness.write("b.txt", "earth");
        harness.generate("after.csv").unwrap();

        let comparison = harness.compare("result.txt", "before.csv", "after.csv", |_| {}).unwrap();
        assert_eq!(comparison.stats.files_processed, 2);
        assert_eq!(comparison.stats.difference_count, 1);

        // Similar lines may carry `? ` hints between them
        let changes: Vec<String> = harness
            .read_lines("result.txt")
            .into_iter()
            .filter(|l| !l.starts_with("? "))
            .collect();
        assert_eq!(
            changes,
            vec![
                format!("- {}", record_line(&b, "world")),
                format!("+ {}", record_line(&b, "earth")),
            ]
        );
    }

    #[test]
    fn test_unified_report_of_modified_file() {
        let harness = DiffspotTestHarness::new();
        harness.write("a.txt", "hello");
        let b = harness.write("b.txt", "world");
        harness.generate("before.csv").unwrap();
        harness.write("b.txt", "earth");
        harness.generate("after.csv").unwrap();

        harness
            .compare("result.txt", "before.csv", "after.csv", |r| r.unified_diff = true)
            .unwrap();
        assert_eq!(
            harness.read_lines("result.txt"),
            vec![
                format!("--- {}", harness.scratch_file("before.csv").display()),
                format!("+++ {}", harness.scratch_file("after.csv").display()),
                "@@ -2 +2 @@".to_string(),
                format!("-{}", record_line(&b, "world")),
                format!("+{}", record_line(&b, "earth")),
            ]
        );
    }

    #[test]
    fn test_added_and_deleted_files() {
        let harness = DiffspotTestHarness::new();
        let keep = harness.write("keep.txt", "same");
        let gone = harness.write("gone.txt", "bye");
        harness.generate("before.csv").unwrap();

        fs::remove_file(&gone).unwrap();
        let new = harness.write("new/file.txt", "hi");
        harness.generate("after.csv").unwrap();

        let comparison = harness.compare("result.txt", "before.csv", "after.csv", |_| {}).unwrap();
        assert_eq!(comparison.stats.added, 1);
        assert_eq!(comparison.stats.removed, 1);

        let result = harness.read_lines("result.txt");
        assert!(result.contains(&format!("- {}", record_line(&gone, "bye"))));
        assert!(result.contains(&format!("+ {}", record_line(&new, "hi"))));
        assert!(!result.iter().any(|l| l.contains(&keep.display().to_string())));

        harness
            .compare("matches.txt", "before.csv", "after.csv", |r| r.only_matches = true)
            .unwrap();
        assert_eq!(
            harness.read_lines("matches.txt"),
            vec![format!("  {}", record_line(&keep, "same"))]
        );
    }

    #[test]
    fn test_unchanged_tree_reports_nothing() {
        let harness = DiffspotTestHarness::new();
        harness.write("a.txt", "one");
        harness.write("dir/b.txt", "two");
        harness.generate("before.csv").unwrap();
        harness.generate("after.csv").unwrap();
        assert_eq!(
            fs::read(harness.scratch_file("before.csv")).unwrap(),
            fs::read(harness.scratch_file("after.csv")).unwrap()
        );

        for unified in [false, true] {
            let result = format!("result-{}.txt", unified);
            let comparison = harness
                .compare(&result, "before.csv", "after.csv", |r| r.unified_diff = unified)
                .unwrap();
            assert!(comparison.is_empty());
            assert_eq!(comparison.stats.difference_count, 0);
            assert_eq!(fs::read_to_string(harness.scratch_file(&result)).unwrap(), "");
        }
    }

    #[test]
    fn test_parallel_manifest_matches_sequential() {
        let harness = DiffspotTestHarness::new();
        for i in 0..300 {
            harness.write(&format!("d{}/f{:03}.txt", i % 7, i), &format!("content {}", i));
        }

        harness.generate("sequential.csv").unwrap();
        let mut request = harness.generate_request("parallel.csv");
        request.jobs = 4;
        let stats = harness.generate_with(request).unwrap();
        assert_eq!(stats.files_processed, 300);

        assert_eq!(
            fs::read(harness.scratch_file("sequential.csv")).unwrap(),
            fs::read(harness.scratch_file("parallel.csv")).unwrap()
        );
    }

    #[test]
    fn test_algorithm_changes_digest_length() {
        let harness = DiffspotTestHarness::new();
        harness.write("a.txt", "hello");
        let mut request = harness.generate_request("sha512.csv");
        request.algorithm = DigestAlgorithm::Sha512;
        harness.generate_with(request).unwrap();

        let records = record::parse_manifest(&fs::read_to_string(harness.scratch_file("sha512.csv")).unwrap()).unwrap();
        assert_eq!(records[0].digest.len(), DigestAlgorithm::Sha512.hex_len());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_recorded() {
        let harness = DiffspotTestHarness::new();
        let target = harness.write("target.txt", "data");
        std::os::unix::fs::symlink(&target, harness.root.join("alias.txt")).unwrap();
        std::os::unix::fs::symlink(harness.temp_dir.path(), harness.root.join("loop")).unwrap();

        let stats = harness.generate("manifest.csv").unwrap();
        assert_eq!(stats.files_processed, 1);
        assert_eq!(harness.read_lines("manifest.csv"), vec![record_line(&target, "data")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_skipped() {
        let harness = DiffspotTestHarness::new();
        let regular = harness.write("regular.txt", "data");
        let fifo = harness.root.join("pipe");
        let created = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !created {
            eprintln!("mkfifo unavailable, skipping");
            return;
        }

        // Reading the FIFO would block forever, so finishing at all is the check
        let stats = harness.generate("manifest.csv").unwrap();
        assert_eq!(stats.files_processed, 1);
        assert_eq!(harness.read_lines("manifest.csv"), vec![record_line(&regular, "data")]);
    }

    #[cfg(unix)]
    #[test]
    #[traced_test]
    fn test_unreadable_file_recorded_when_ignored() {
        let harness = DiffspotTestHarness::new();
        let open = harness.write("a.txt", "visible");
        let secret = harness.write("b.txt", "hidden");
        if !revoke_read(&secret) {
            eprintln!("running with read override, skipping");
            return;
        }

        let mut request = harness.generate_request("manifest.csv");
        request.ignore_permission = true;
        let stats = harness.generate_with(request).unwrap();
        restore_read(&secret);

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.permission_denied, 1);
        assert_eq!(
            harness.read_lines("manifest.csv"),
            vec![record_line(&open, "visible"), format!("{},", secret.display())]
        );
        assert!(logs_contain("recording empty digest"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_aborts_by_default() {
        let harness = DiffspotTestHarness::new();
        let open = harness.write("a.txt", "visible");
        let secret = harness.write("b.txt", "hidden");
        harness.write("c.txt", "after the failure");
        if !revoke_read(&secret) {
            eprintln!("running with read override, skipping");
            return;
        }

        let err = harness.generate("manifest.csv").unwrap_err();
        restore_read(&secret);

        assert!(matches!(err, DiffspotError::PermissionDenied { ref path } if path == &secret));
        assert_eq!(harness.read_lines("manifest.csv"), vec![record_line(&open, "visible")]);
    }

    /// Tree of 300 files spanning several hashing batches; the 151st is unreadable
    #[cfg(unix)]
    fn wide_tree_with_unreadable_file(harness: &DiffspotTestHarness) -> Option<(Vec<PathBuf>, PathBuf)> {
        let files: Vec<PathBuf> = (0..300)
            .map(|i| harness.write(&format!("f{:03}.txt", i), &format!("content {}", i)))
            .collect();
        let secret = files[150].clone();
        if !revoke_read(&secret) {
            restore_read(&secret);
            eprintln!("running with read override, skipping");
            return None;
        }
        Some((files, secret))
    }

    #[cfg(unix)]
    #[test]
    fn test_parallel_unreadable_file_aborts_in_order() {
        let harness = DiffspotTestHarness::new();
        let Some((files, secret)) = wide_tree_with_unreadable_file(&harness) else {
            return;
        };

        let mut request = harness.generate_request("manifest.csv");
        request.jobs = 4;
        let err = harness.generate_with(request).unwrap_err();
        restore_read(&secret);

        assert!(matches!(err, DiffspotError::PermissionDenied { ref path } if path == &secret));
        let expected: Vec<String> = files[..150]
            .iter()
            .enumerate()
            .map(|(i, path)| record_line(path, &format!("content {}", i)))
            .collect();
        assert_eq!(harness.read_lines("manifest.csv"), expected);
    }

    #[cfg(unix)]
    #[test]
    #[traced_test]
    fn test_parallel_unreadable_file_matches_sequential_when_ignored() {
        let harness = DiffspotTestHarness::new();
        let Some((files, secret)) = wide_tree_with_unreadable_file(&harness) else {
            return;
        };

        let mut sequential = harness.generate_request("sequential.csv");
        sequential.ignore_permission = true;
        let sequential_stats = harness.generate_with(sequential).unwrap();
        let mut parallel = harness.generate_request("parallel.csv");
        parallel.ignore_permission = true;
        parallel.jobs = 4;
        let parallel_stats = harness.generate_with(parallel).unwrap();
        restore_read(&secret);

        assert_eq!(parallel_stats.files_processed, 300);
        assert_eq!(parallel_stats.permission_denied, 1);
        assert_eq!(sequential_stats.permission_denied, 1);
        assert_eq!(
            fs::read(harness.scratch_file("sequential.csv")).unwrap(),
            fs::read(harness.scratch_file("parallel.csv")).unwrap()
        );

        let lines = harness.read_lines("parallel.csv");
        assert_eq!(lines.len(), files.len());
        assert_eq!(lines[150], format!("{},", secret.display()));
        assert_eq!(lines[149], record_line(&files[149], "content 149"));
        assert_eq!(lines[151], record_line(&files[151], "content 151"));
        assert!(logs_contain("recording empty digest"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_follows_policy() {
        let harness = DiffspotTestHarness::new();
        let open = harness.write("a.txt", "visible");
        harness.write("locked/inner.txt", "hidden");
        let locked = harness.root.join("locked");
        if !revoke_read(&locked) {
            restore_read(&locked);
            eprintln!("running with read override, skipping");
            return;
        }

        let aborted = harness.generate("strict.csv");
        let mut request = harness.generate_request("lenient.csv");
        request.ignore_permission = true;
        let lenient = harness.generate_with(request);
        restore_read(&locked);

        assert!(matches!(aborted, Err(DiffspotError::PermissionDenied { .. })));
        assert_eq!(lenient.unwrap().files_processed, 1);
        assert_eq!(harness.read_lines("lenient.csv"), vec![record_line(&open, "visible")]);
    }

    #[test]
    fn test_compare_can_overwrite_an_input() {
        let harness = DiffspotTestHarness::new();
        fs::write(harness.scratch_file("before.csv"), "/a,1\n/b,2\n").unwrap();
        fs::write(harness.scratch_file("after.csv"), "/a,1\n/b,3\n").unwrap();

        let comparison = harness
            .compare("before.csv", "before.csv", "after.csv", |r| r.overwrite = true)
            .unwrap();
        assert_eq!(comparison.stats.difference_count, 1);
        assert_eq!(harness.read_lines("before.csv"), vec!["- /b,2", "+ /b,3"]);
    }
}
