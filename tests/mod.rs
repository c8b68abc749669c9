//! Main test module for diffspot
//!
//! This module includes all test suites:
//! - Integration tests for end-to-end generate/compare scenarios
//! - Property-based tests for invariants
//! - Edge cases of the manifest format and traversal

pub mod integration;

#[cfg(test)]
mod edge_cases {
    use ::diffspot::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn generate_into(root: &Path, output: &Path) -> HashStats {
        let mode = RunMode::try_from(RunRequest {
            generate: Some(output.to_path_buf()),
            location: Some(root.to_path_buf()),
            ..Default::default()
        })
        .unwrap();
        match run::<fn(ProgressInfo)>(&mode, None).unwrap() {
            RunOutcome::Generated(stats) => stats,
            RunOutcome::Compared(_) => panic!("expected a generation run"),
        }
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("empty");
        fs::create_dir(&root).unwrap();
        let output = temp_dir.path().join("manifest.csv");

        let stats = generate_into(&root, &output);
        assert_eq!(stats.files_processed, 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }

    #[test]
    fn test_special_filenames() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir(&root).unwrap();

        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "comma,in,name.txt",
            "ünïcödé.txt",
            ".hidden",
        ];
        for name in &special_names {
            fs::write(root.join(name), name.as_bytes()).unwrap();
        }

        let output = temp_dir.path().join("manifest.csv");
        let stats = generate_into(&root, &output);
        assert_eq!(stats.files_processed, special_names.len());

        let records = record::parse_manifest(&fs::read_to_string(&output).unwrap()).unwrap();
        for name in &special_names {
            let expected_path = root.join(name).to_string_lossy().into_owned();
            let record = records
                .iter()
                .find(|r| r.path == expected_path)
                .unwrap_or_else(|| panic!("no record for {}", name));
            assert_eq!(
                record.digest,
                digest::hash_bytes(DigestAlgorithm::Sha224, name.as_bytes())
            );
        }
    }

    #[test]
    fn test_empty_file_has_full_digest() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("empty"), b"").unwrap();

        let output = temp_dir.path().join("manifest.csv");
        generate_into(&root, &output);

        let records = record::parse_manifest(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_unreadable());
        assert_eq!(
            records[0].digest,
            "d14a028c2a3a2bc9476102bb288234c415a2b01f828ea62ac5b3e42f"
        );
    }

    #[test]
    fn test_large_file_spanning_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir(&root).unwrap();
        let content: Vec<u8> = (0..(3 * digest::BLOCK_SIZE + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(root.join("big.bin"), &content).unwrap();

        let output = temp_dir.path().join("manifest.csv");
        let stats = generate_into(&root, &output);
        assert_eq!(stats.bytes_hashed, content.len() as u64);

        let records = record::parse_manifest(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(records[0].digest, digest::hash_bytes(DigestAlgorithm::Sha224, &content));
    }

    #[test]
    fn test_manifest_without_trailing_newline() {
        let before = ["/a,1", "/b,2"];
        let after_text = "/a,1\n/b,2";
        let after: Vec<&str> = after_text.lines().collect();
        let comparison = compare_lines(&before[..], &after[..], &DiffOptions::default());
        assert!(comparison.is_empty());
        assert_eq!(comparison.stats.difference_count, 0);
    }

    #[test]
    fn test_output_inside_location_is_not_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        fs::write(root.join("data.txt"), "data").unwrap();
        let output = root.join("manifest.csv");

        let stats = generate_into(&root, &output);
        assert_eq!(stats.files_processed, 1);
        let manifest = fs::read_to_string(&output).unwrap();
        assert!(!manifest.contains("manifest.csv"));
    }
}
