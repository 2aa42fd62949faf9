//! Engine Module
//!
//! The storage facade that coordinates the content store and the index.
//!
//! ## Responsibilities
//! - Open both logs from one configuration
//! - Route add/get/contains to the store and the guarded index
//! - Commit and roll back both logs in a fixed order (store, then index)
//! - Roll back both logs when a compound add fails halfway
//! - Refuse every operation once closed

use std::fs;
use std::path::Path;

use bytes::Bytes;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{BinStoreError, Result};
use crate::index::{BlobIndex, IndexGuard};
use crate::location::ContentLocation;
use crate::store::{BlobStore, Content};

/// Embedded key → blob storage
///
/// ## Concurrency Model
///
/// - **Content** (`BlobStore`): many concurrent appends and reads, each
///   append on its own reserved range; growth blocks everyone briefly
/// - **Index** (`IndexGuard<BlobIndex>`): one caller at a time, bounded wait
/// - **Transactions**: adds hold the read side of `Logs::transactions`,
///   commit and rollback the write side, so neither log header is written
///   while an add sits between its two steps
/// - **Lifecycle**: every operation holds the read side of `logs`; `close`
///   takes the write side, so it waits for in-flight calls and later calls
///   see `Disposed`
pub struct BinStorage {
    /// Storage configuration
    config: Config,

    /// Both logs, `None` once closed
    logs: RwLock<Option<Logs>>,
}

/// The two logs behind the facade
struct Logs {
    store: BlobStore,
    index: IndexGuard<BlobIndex>,
    transactions: RwLock<()>,
}

impl BinStorage {
    /// Open or create storage with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Create the working folder if needed
    /// 3. Open the content log
    /// 4. Open the index log (replays it into memory) behind its guard
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Reject unusable settings early
        config.validate()?;

        // Step 2: Create working folder if it doesn't exist
        fs::create_dir_all(&config.working_folder)?;

        // Step 3: Content log
        let store = BlobStore::open(
            &config.storage_path(),
            config.storage_capacity,
            config.read_buffer_size,
        )?;

        // Step 4: Index log behind its guard
        let index = BlobIndex::open(&config.index_path(), config.index_capacity)?;
        let entries = index.len();
        let index = IndexGuard::new(index, config.index_timeout);

        info!(
            working_folder = %config.working_folder.display(),
            entries,
            "opened storage"
        );

        Ok(Self {
            config,
            logs: RwLock::new(Some(Logs {
                store,
                index,
                transactions: RwLock::new(()),
            })),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified working folder
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().working_folder(path).build();
        Self::open(config)
    }

    /// Store `content` under `key`
    ///
    /// Steps:
    /// 1. Append the content to the store (yields its location)
    /// 2. Record `key → location` through the index guard
    ///
    /// If either step fails, both logs are rolled back before the error is
    /// returned.
    pub fn add<C: Content>(&self, key: &str, content: C) -> Result<ContentLocation> {
        validate_key(key)?;
        let logs = self.logs()?;
        let _add = logs.transactions.read();

        let result = logs
            .store
            .append(content)
            .and_then(|location| logs.index.add(key, location).map(|_| location));

        if let Err(e) = &result {
            warn!(key, error = %e, "add failed, rolling back both logs");
            if let Err(rollback_err) = logs.rollback_logs() {
                error!(key, error = %rollback_err, "rollback after failed add also failed");
            }
        }

        result
    }

    /// Content stored under `key`
    pub fn get(&self, key: &str) -> Result<Bytes> {
        validate_key(key)?;
        let logs = self.logs()?;

        let location = logs.index.get(key)?;
        logs.store.get(&location)
    }

    /// Location (offset, size, checksum) stored under `key`
    pub fn locate(&self, key: &str) -> Result<ContentLocation> {
        validate_key(key)?;
        self.logs()?.index.get(key)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.logs()?.index.contains(key)
    }

    /// Make every add so far durable
    ///
    /// The store goes first so a committed index entry never points at
    /// unflushed content.
    pub fn commit(&self) -> Result<()> {
        self.logs()?.commit()
    }

    /// Return both logs to the state persisted when they were opened
    pub fn rollback(&self) -> Result<()> {
        self.logs()?.rollback()
    }

    /// Flush and release both logs
    ///
    /// Uncommitted work is not committed. Closing twice is a no-op; any other
    /// call afterwards fails with `Disposed`.
    pub fn close(&self) -> Result<()> {
        let Some(logs) = self.logs.write().take() else {
            return Ok(());
        };

        logs.store.close()?;
        logs.index.into_inner().close()?;

        debug!(working_folder = %self.config.working_folder.display(), "closed storage");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.logs.read().is_none()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn logs(&self) -> Result<MappedRwLockReadGuard<'_, Logs>> {
        RwLockReadGuard::try_map(self.logs.read(), Option::as_ref)
            .map_err(|_| BinStoreError::Disposed)
    }
}

impl Logs {
    /// Waits for in-flight adds, so every index entry that gets persisted
    /// points into the store range persisted just before it
    fn commit(&self) -> Result<()> {
        let _exclusive = self.transactions.write();
        self.store.commit()?;
        self.index.commit()
    }

    fn rollback(&self) -> Result<()> {
        let _exclusive = self.transactions.write();
        self.rollback_logs()
    }

    /// Rollback for a caller already holding `transactions`
    fn rollback_logs(&self) -> Result<()> {
        self.store.rollback()?;
        self.index.rollback()
    }
}

impl Drop for BinStorage {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "failed to close storage");
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(BinStoreError::InvalidArgument("key is empty".to_string()));
    }
    Ok(())
}
