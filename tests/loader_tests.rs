//! Tests for the directory loader
//!
//! These tests verify:
//! - Recursive file enumeration
//! - Retries while the index lock times out
//! - Load, commit and verify of a directory tree
//! - Rollback and an error result when a file cannot be added
//! - Verification failures on changed sources

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use binstore::loader::{self, LoadOptions};
use binstore::{BinStorage, BinStoreError, Config};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .working_folder(temp_dir.path().join("store"))
        .index_capacity(512)
        .storage_capacity(512)
        .read_buffer_size(32)
        .build()
}

/// input/{a.txt, b.bin, empty, sub/c.txt, sub/deeper/d.txt}
fn build_tree(root: &Path) -> Vec<PathBuf> {
    let files = vec![
        root.join("a.txt"),
        root.join("b.bin"),
        root.join("empty"),
        root.join("sub").join("c.txt"),
        root.join("sub").join("deeper").join("d.txt"),
    ];

    fs::create_dir_all(root.join("sub").join("deeper")).unwrap();
    // A directory with nothing in it contributes no entries
    fs::create_dir_all(root.join("hollow")).unwrap();

    for (i, path) in files.iter().enumerate() {
        let content = if path.ends_with("empty") {
            Vec::new()
        } else {
            format!("file {} ", i).repeat(40 * (i + 1)).into_bytes()
        };
        fs::write(path, content).unwrap();
    }
    files
}

fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
}

// =============================================================================
// Enumeration Tests
// =============================================================================

#[test]
fn test_collect_files_is_recursive() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("input");
    let expected = build_tree(&root);

    let found = loader::collect_files(&root).unwrap();

    assert_eq!(found.len(), expected.len());
    assert_eq!(sorted(found), sorted(expected));
}

#[test]
fn test_collect_files_missing_root_fails() {
    let temp_dir = TempDir::new().unwrap();

    assert!(loader::collect_files(&temp_dir.path().join("nowhere")).is_err());
}

// =============================================================================
// Retry Tests
// =============================================================================

#[test]
fn test_retry_succeeds_after_timeouts() {
    let calls = Cell::new(0);

    let result = loader::retry_on_timeout(3, "key", || {
        calls.set(calls.get() + 1);
        if calls.get() < 3 {
            Err(BinStoreError::OperationTimedOut(Duration::from_millis(5)))
        } else {
            Ok(calls.get())
        }
    });

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_retry_gives_up_after_last_attempt() {
    let calls = Cell::new(0);

    let result: binstore::Result<()> = loader::retry_on_timeout(3, "key", || {
        calls.set(calls.get() + 1);
        Err(BinStoreError::OperationTimedOut(Duration::from_millis(5)))
    });

    assert!(matches!(result, Err(BinStoreError::OperationTimedOut(_))));
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_retry_does_not_repeat_other_errors() {
    let calls = Cell::new(0);

    let result: binstore::Result<()> = loader::retry_on_timeout(3, "key", || {
        calls.set(calls.get() + 1);
        Err(BinStoreError::DuplicateKey("key".to_string()))
    });

    assert!(matches!(result, Err(BinStoreError::DuplicateKey(_))));
    assert_eq!(calls.get(), 1);
}

// =============================================================================
// Load/Verify Tests
// =============================================================================

#[test]
fn test_load_then_verify() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("input");
    build_tree(&root);
    let config = test_config(&temp_dir);

    let files = loader::collect_files(&root).unwrap();
    loader::load(&config, &files, &LoadOptions::default()).unwrap();
    loader::verify(&config, &files, 4).unwrap();

    // Keys are the file paths
    let storage = BinStorage::open(config).unwrap();
    for path in &files {
        let stored = storage.get(&path.to_string_lossy()).unwrap();
        assert_eq!(stored, fs::read(path).unwrap());
    }
}

#[test]
fn test_failed_load_rolls_back_and_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("input");
    let mut files = build_tree(&root);
    files.push(root.join("vanished.txt"));
    let config = test_config(&temp_dir);

    let options = LoadOptions {
        threads: 1,
        retries: 3,
    };
    let result = loader::load(&config, &files, &options);

    assert!(matches!(result, Err(BinStoreError::Io(_))));

    // Files added before the failure are gone too
    let storage = BinStorage::open(config).unwrap();
    for path in &files {
        assert!(!storage.contains(&path.to_string_lossy()).unwrap());
    }
}

#[test]
fn test_load_rejects_already_stored_file() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("input");
    build_tree(&root);
    let config = test_config(&temp_dir);
    let files = loader::collect_files(&root).unwrap();

    loader::load(&config, &files, &LoadOptions::default()).unwrap();
    let result = loader::load(&config, &files, &LoadOptions::default());

    assert!(matches!(result, Err(BinStoreError::DuplicateKey(_))));
    loader::verify(&config, &files, 2).unwrap();
}

#[test]
fn test_verify_detects_changed_content() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("input");
    build_tree(&root);
    let config = test_config(&temp_dir);
    let files = loader::collect_files(&root).unwrap();
    loader::load(&config, &files, &LoadOptions::default()).unwrap();

    // Same length, different bytes
    let target = root.join("a.txt");
    let mut bytes = fs::read(&target).unwrap();
    bytes[0] ^= 0xff;
    fs::write(&target, &bytes).unwrap();

    let storage = BinStorage::open(config.clone()).unwrap();
    assert!(matches!(
        loader::verify_file(&storage, &target),
        Err(BinStoreError::Corruption(_))
    ));
    loader::verify_file(&storage, &root.join("b.bin")).unwrap();
    storage.close().unwrap();

    // Different length
    fs::write(root.join("b.bin"), b"short").unwrap();
    assert!(matches!(
        loader::verify(&config, &files, 1),
        Err(BinStoreError::Corruption(_))
    ));
}

#[test]
fn test_verify_missing_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("input");
    let files = build_tree(&root);
    let config = test_config(&temp_dir);

    loader::load(&config, &files[..2], &LoadOptions::default()).unwrap();

    assert!(matches!(
        loader::verify(&config, &files, 2),
        Err(BinStoreError::KeyNotFound(_))
    ));
}
