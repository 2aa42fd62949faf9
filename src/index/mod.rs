//! Index Module
//!
//! Persistent key → content location mapping.
//!
//! ## Responsibilities
//! - Append one record per key to a memory-mapped log
//! - Rebuild the in-memory directory by replaying the log on open
//! - Reject duplicate keys in O(1) against the directory
//! - Serialize concurrent callers through [`IndexGuard`]
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Cursor (8)                                                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Record 1                                                    │
//! │ ┌──────────┬─────────┬────────┬──────────┬──────────┬─────┐ │
//! │ │KeyOff (8)│KeyLen(4)│Size (8)│Offset (8)│Digest(16)│ Key │ │
//! │ └──────────┴─────────┴────────┴──────────┴──────────┴─────┘ │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Record 2 ...                                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │ KeyOff == 0 (end of log)                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `KeyOff` is the absolute offset of the key bytes, i.e. record start + 44.

mod blob_index;
mod guard;
mod record;

pub use blob_index::BlobIndex;
pub use guard::IndexGuard;
pub use record::RECORD_HEADER_SIZE;

use crate::error::Result;
use crate::location::ContentLocation;

/// Where a key's bytes live in the index file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub key: String,
    /// Absolute offset of the key bytes
    pub key_offset: u64,
    /// Key length in bytes
    pub key_size: u32,
}

/// One key → location association as held in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub record: KeyRecord,
    pub location: ContentLocation,
}

/// Operations every index offers
///
/// Implementations need not be thread-safe; [`IndexGuard`] provides that.
pub trait Index {
    /// Record `key → location`; fails on an empty or already known key
    fn add(&mut self, key: &str, location: ContentLocation) -> Result<()>;

    /// Location stored under `key`, or `KeyNotFound`
    fn get(&self, key: &str) -> Result<ContentLocation>;

    fn contains(&self, key: &str) -> bool;

    /// Make everything added so far durable
    fn commit(&mut self) -> Result<()>;

    /// Return the durable state to the session-open checkpoint
    fn rollback(&mut self) -> Result<()>;
}
