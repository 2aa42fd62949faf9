//! Blob Index
//!
//! Append-only key → location log with an in-memory directory rebuilt by
//! replay at open time.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{BinStoreError, Result};
use crate::location::ContentLocation;
use crate::mmap::{LogFile, HEADER_SIZE};

use super::record::{RawHeader, RECORD_HEADER_SIZE};
use super::{Index, IndexEntry, KeyRecord};

/// Persistent key → content location index
///
/// Not synchronized: wrap it in an [`IndexGuard`](super::IndexGuard) before
/// sharing it between threads.
pub struct BlobIndex {
    /// Backing mapping
    log: LogFile,

    /// Next free byte in this session
    cursor: u64,

    /// Cursor as persisted when this session opened the file
    checkpoint: u64,

    /// Authoritative lookup table; disk is only read again on reopen
    directory: HashMap<String, IndexEntry>,
}

impl BlobIndex {
    /// Open or create an index log and rebuild its directory
    ///
    /// On startup:
    /// 1. Map the file (raising capacity to an existing larger file)
    /// 2. Read the persisted cursor
    /// 3. Replay every record below the cursor into the directory
    pub fn open(path: &Path, capacity: u64) -> Result<Self> {
        let log = LogFile::open(path, capacity)?;

        let cursor = log.load_cursor()?;
        let directory = replay(&log, cursor)?;

        info!(
            path = %path.display(),
            capacity = log.capacity(),
            cursor,
            entries = directory.len(),
            "opened blob index"
        );

        Ok(Self {
            log,
            cursor,
            checkpoint: cursor,
            directory,
        })
    }

    /// Record `key → location`
    ///
    /// Fails with `DuplicateKey` if the key is already known; the log is left
    /// untouched in that case.
    pub fn add(&mut self, key: &str, location: ContentLocation) -> Result<()> {
        if key.is_empty() {
            return Err(BinStoreError::InvalidArgument("key is empty".to_string()));
        }

        if self.directory.contains_key(key) {
            return Err(BinStoreError::DuplicateKey(key.to_string()));
        }

        let key_size = i32::try_from(key.len()).map_err(|_| {
            BinStoreError::InvalidArgument(format!("key of {} bytes is too long", key.len()))
        })?;

        let record_start = self.cursor;
        let key_offset = record_start + RECORD_HEADER_SIZE as u64;
        let record_end = key_offset + key.len() as u64;

        self.log.grow(record_end)?;

        let header = RawHeader {
            key_offset: to_signed(key_offset)?,
            key_size,
            size: to_signed(location.size)?,
            offset: to_signed(location.offset)?,
            checksum: location.checksum,
        };

        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + key.len());
        record.extend_from_slice(&header.encode());
        record.extend_from_slice(key.as_bytes());
        self.log.write(record_start, &record)?;

        self.cursor = record_end;
        self.directory.insert(
            key.to_string(),
            IndexEntry {
                record: KeyRecord {
                    key: key.to_string(),
                    key_offset,
                    key_size: key.len() as u32,
                },
                location,
            },
        );

        Ok(())
    }

    /// Location stored under `key`
    pub fn get(&self, key: &str) -> Result<ContentLocation> {
        if key.is_empty() {
            return Err(BinStoreError::InvalidArgument("key is empty".to_string()));
        }

        self.directory
            .get(key)
            .map(|entry| entry.location)
            .ok_or_else(|| BinStoreError::KeyNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.directory.contains_key(key)
    }

    /// Persist the current cursor, making every record so far durable
    pub fn commit(&mut self) -> Result<()> {
        self.log.flush()?;
        self.log.store_cursor(self.cursor)?;

        debug!(path = %self.log.path().display(), cursor = self.cursor, "committed blob index");
        Ok(())
    }

    /// Restore the cursor persisted when this session opened the file
    ///
    /// The directory is left as is, so this instance keeps answering for keys
    /// a fresh open will no longer see.
    pub fn rollback(&mut self) -> Result<()> {
        self.log.store_cursor(self.checkpoint)?;

        debug!(
            path = %self.log.path().display(),
            checkpoint = self.checkpoint,
            "rolled back blob index"
        );
        Ok(())
    }

    /// Flush outstanding pages and release the mapping
    ///
    /// Does not commit.
    pub fn close(self) -> Result<()> {
        self.log.flush()?;
        debug!(path = %self.log.path().display(), "closed blob index");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Full directory entry for `key`
    pub fn entry(&self, key: &str) -> Option<&IndexEntry> {
        self.directory.get(key)
    }

    /// Number of keys in the directory
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Iterate over every known key (unordered)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.directory.keys().map(String::as_str)
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn checkpoint(&self) -> u64 {
        self.checkpoint
    }

    pub fn capacity(&self) -> u64 {
        self.log.capacity()
    }
}

impl Index for BlobIndex {
    fn add(&mut self, key: &str, location: ContentLocation) -> Result<()> {
        BlobIndex::add(self, key, location)
    }

    fn get(&self, key: &str) -> Result<ContentLocation> {
        BlobIndex::get(self, key)
    }

    fn contains(&self, key: &str) -> bool {
        BlobIndex::contains(self, key)
    }

    fn commit(&mut self) -> Result<()> {
        BlobIndex::commit(self)
    }

    fn rollback(&mut self) -> Result<()> {
        BlobIndex::rollback(self)
    }
}

// =============================================================================
// Replay
// =============================================================================

/// Rebuild the directory from the records in `[HEADER_SIZE, bound)`
///
/// Stops at a zero `keyOffset` sentinel or at `bound`. Bytes past the
/// persisted cursor belong to uncommitted or rolled-back work and are ignored.
fn replay(log: &LogFile, bound: u64) -> Result<HashMap<String, IndexEntry>> {
    let mut directory = HashMap::new();
    let mut position = HEADER_SIZE;

    while position < bound {
        if position + RECORD_HEADER_SIZE as u64 > bound {
            return Err(BinStoreError::Corruption(format!(
                "truncated record header at {} (cursor {})",
                position, bound
            )));
        }

        let mut buf = [0u8; RECORD_HEADER_SIZE];
        log.read(position, &mut buf)?;

        let header = RawHeader::decode(&buf);
        if header.is_sentinel() {
            break;
        }

        let entry = decode_entry(log, position, &header, bound)?;
        position = entry.record.key_offset + u64::from(entry.record.key_size);

        if directory.contains_key(&entry.record.key) {
            return Err(BinStoreError::Corruption(format!(
                "key {:?} recorded twice",
                entry.record.key
            )));
        }
        directory.insert(entry.record.key.clone(), entry);
    }

    Ok(directory)
}

fn decode_entry(log: &LogFile, position: u64, header: &RawHeader, bound: u64) -> Result<IndexEntry> {
    let corrupt = |what: &str| {
        BinStoreError::Corruption(format!("record at {}: {} ({:?})", position, what, header))
    };

    let expected_key_offset = position + RECORD_HEADER_SIZE as u64;
    if u64::try_from(header.key_offset).ok() != Some(expected_key_offset) {
        return Err(corrupt("key offset does not follow its header"));
    }

    let key_size = u32::try_from(header.key_size).map_err(|_| corrupt("negative key size"))?;
    let size = u64::try_from(header.size).map_err(|_| corrupt("negative content size"))?;
    let offset = u64::try_from(header.offset).map_err(|_| corrupt("negative content offset"))?;

    if expected_key_offset + u64::from(key_size) > bound {
        return Err(corrupt("key runs past the cursor"));
    }

    let mut key_bytes = vec![0u8; key_size as usize];
    log.read(expected_key_offset, &mut key_bytes)?;
    let key = String::from_utf8(key_bytes).map_err(|_| corrupt("key is not UTF-8"))?;

    Ok(IndexEntry {
        record: KeyRecord {
            key,
            key_offset: expected_key_offset,
            key_size,
        },
        location: ContentLocation {
            size,
            offset,
            checksum: header.checksum,
        },
    })
}

fn to_signed(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| BinStoreError::InvalidArgument(format!("{} does not fit in i64", value)))
}
