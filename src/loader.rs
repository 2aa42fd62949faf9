//! Loader Module
//!
//! Bulk-loads a directory tree into a storage and verifies it afterwards.
//! Each file is stored under its path.
//!
//! ## Flow
//! 1. `collect_files` walks the tree
//! 2. `load` adds every file on a pool of workers, then commits; the first
//!    failure rolls both logs back instead
//! 3. `verify` reopens the storage and checks every file's length and checksum

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam::channel;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::BinStorage;
use crate::error::{BinStoreError, Result};
use crate::location::Checksum;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default attempts per file while the index lock keeps timing out
pub const DEFAULT_RETRIES: u32 = 3;

/// Worker pool settings for `load` and `verify`
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub threads: usize,
    pub retries: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// Add every file, then commit; roll back everything on the first failure
pub fn load(config: &Config, files: &[PathBuf], options: &LoadOptions) -> Result<()> {
    let storage = BinStorage::open(config.clone())?;

    match run_workers(files, options.threads, |path| {
        add_file(&storage, path, options.retries)
    }) {
        Ok(()) => {
            storage.commit()?;
            info!(files = files.len(), "load committed");
            storage.close()
        }
        Err(e) => {
            warn!(error = %e, "load failed, rolling back");
            storage.rollback()?;
            storage.close()?;
            Err(e)
        }
    }
}

/// Store one file under its path, retrying while the index is busy
pub fn add_file(storage: &BinStorage, path: &Path, retries: u32) -> Result<()> {
    let key = path.to_string_lossy();
    retry_on_timeout(retries, &key, || storage.add(&key, File::open(path)?))?;
    debug!(key = %key, "added file");
    Ok(())
}

/// Run `operation` up to `attempts` times while it fails with
/// `OperationTimedOut`; any other outcome is returned as is
pub fn retry_on_timeout<T, F>(attempts: u32, key: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 1;
    loop {
        match operation() {
            Err(BinStoreError::OperationTimedOut(waited)) if attempt < attempts => {
                warn!(key, attempt, ?waited, "index busy, retrying");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

/// Reopen the storage and compare every file with what was stored
pub fn verify(config: &Config, files: &[PathBuf], threads: usize) -> Result<()> {
    let storage = BinStorage::open(config.clone())?;
    let outcome = run_workers(files, threads, |path| verify_file(&storage, path));
    storage.close()?;
    outcome
}

/// Check one file's length and checksum against the stored blob
pub fn verify_file(storage: &BinStorage, path: &Path) -> Result<()> {
    let key = path.to_string_lossy();
    let stored = storage.get(&key)?;
    let location = storage.locate(&key)?;

    let source_len = fs::metadata(path)?.len();
    if source_len != stored.len() as u64 {
        return Err(BinStoreError::Corruption(format!(
            "length did not match for {}: source {}, stored {}",
            key,
            source_len,
            stored.len()
        )));
    }

    let expected = Checksum::of_reader(File::open(path)?)?;
    if expected != Checksum::of(&stored) || expected != location.checksum {
        return Err(BinStoreError::Corruption(format!(
            "checksums do not match for {}",
            key
        )));
    }

    Ok(())
}

/// Every regular file below `root`, depth first, sorted per directory
pub fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Run `work` over `files` on `threads` workers fed by one queue
///
/// The first failure stops every worker and is returned.
fn run_workers<F>(files: &[PathBuf], threads: usize, work: F) -> Result<()>
where
    F: Fn(&Path) -> Result<()> + Sync,
{
    let (tx, rx) = channel::unbounded::<&Path>();
    for path in files {
        // The receiver is alive, so sending cannot fail
        let _ = tx.send(path.as_path());
    }
    drop(tx);

    let failed = AtomicBool::new(false);

    thread::scope(|scope| {
        let workers: Vec<_> = (0..threads.max(1))
            .map(|_| {
                let rx = rx.clone();
                let work = &work;
                let failed = &failed;
                scope.spawn(move || -> Result<()> {
                    for path in rx.iter() {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = work(path) {
                            failed.store(true, Ordering::Relaxed);
                            return Err(e);
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        let mut outcome = Ok(());
        for worker in workers {
            let result = worker.join().unwrap_or_else(|_| {
                Err(io::Error::new(io::ErrorKind::Other, "worker thread panicked").into())
            });
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    })
}
