//! Integration tests for binstore
//!
//! End-to-end scenarios spanning several storage sessions on the same
//! working folder.

use std::fs;
use std::thread;

use binstore::{BinStorage, BinStoreError, Checksum, Config};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn small_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .working_folder(temp_dir.path().join("data"))
        .index_capacity(256)
        .storage_capacity(256)
        .read_buffer_size(32)
        .build()
}

fn blob(i: usize) -> Vec<u8> {
    format!("blob number {} ", i).repeat(i % 17 + 1).into_bytes()
}

// =============================================================================
// Session Lifecycle Tests
// =============================================================================

#[test]
fn test_sessions_accumulate_committed_work_only() {
    let temp_dir = TempDir::new().unwrap();

    // Session 1: committed
    {
        let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
        for i in 0..20 {
            storage.add(&format!("s1/{}", i), blob(i).as_slice()).unwrap();
        }
        storage.commit().unwrap();
    }

    // Session 2: rolled back
    {
        let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
        for i in 0..20 {
            storage.add(&format!("s2/{}", i), blob(i).as_slice()).unwrap();
        }
        storage.rollback().unwrap();
    }

    // Session 3: abandoned without commit
    {
        let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
        storage.add("s3/only", &b"never committed"[..]).unwrap();
    }

    // Session 4: committed on top of the rolled back space
    {
        let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
        for i in 0..5 {
            storage.add(&format!("s4/{}", i), blob(100 + i).as_slice()).unwrap();
        }
        storage.commit().unwrap();
        storage.close().unwrap();
    }

    let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
    for i in 0..20 {
        let stored = storage.get(&format!("s1/{}", i)).unwrap();
        assert_eq!(stored, blob(i));
        assert!(!storage.contains(&format!("s2/{}", i)).unwrap());
    }
    assert!(!storage.contains("s3/only").unwrap());
    for i in 0..5 {
        let key = format!("s4/{}", i);
        let stored = storage.get(&key).unwrap();
        assert_eq!(stored, blob(100 + i));
        assert_eq!(storage.locate(&key).unwrap().checksum, Checksum::of(&stored));
    }
}

#[test]
fn test_parallel_file_adds_verify_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input");
    fs::create_dir_all(input.join("nested")).unwrap();

    let mut files = vec![];
    for i in 0..12 {
        let dir = if i % 3 == 0 { input.join("nested") } else { input.clone() };
        let path = dir.join(format!("file-{}.dat", i));
        fs::write(&path, blob(i * 7)).unwrap();
        files.push(path);
    }

    // Parallel load straight through the facade, one key per file path
    {
        let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
        thread::scope(|scope| {
            for chunk in files.chunks(3) {
                let storage = &storage;
                scope.spawn(move || {
                    for path in chunk {
                        let file = fs::File::open(path).unwrap();
                        storage.add(&path.to_string_lossy(), file).unwrap();
                    }
                });
            }
        });
        storage.commit().unwrap();
    }

    let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
    for path in &files {
        let key = path.to_string_lossy();
        let stored = storage.get(&key).unwrap();
        let expected = Checksum::of_reader(fs::File::open(path).unwrap()).unwrap();

        assert_eq!(stored.len() as u64, fs::metadata(path).unwrap().len());
        assert_eq!(Checksum::of(&stored), expected);
        assert_eq!(storage.locate(&key).unwrap().checksum, expected);
    }
}

#[test]
fn test_dropped_storage_releases_files() {
    let temp_dir = TempDir::new().unwrap();

    let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
    storage.add("key", &b"value"[..]).unwrap();
    storage.commit().unwrap();
    drop(storage);

    // A second instance opens the same files once the first is gone
    let storage = BinStorage::open(small_config(&temp_dir)).unwrap();
    assert_eq!(storage.get("key").unwrap(), &b"value"[..]);
    assert!(matches!(
        storage.add("key", &b"again"[..]),
        Err(BinStoreError::DuplicateKey(_))
    ));
}
