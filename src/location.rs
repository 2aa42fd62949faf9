//! Content locations and checksums
//!
//! Values handed out by the store and recorded by the index. They are plain
//! copies, never views into a mapping, so growing a log never invalidates them.

use std::fmt;
use std::io::{self, Read};

/// Size of a content checksum in bytes
pub const CHECKSUM_SIZE: usize = 16;

/// 16-byte content digest
///
/// BLAKE3 in extended-output mode, truncated to the 16-byte on-disk slot.
/// The slot has the size of an MD5 digest but never holds one, so logs
/// written by MD5-based tools do not verify here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checksum([u8; CHECKSUM_SIZE]);

impl Checksum {
    /// Wrap raw digest bytes (as read back from disk)
    pub fn from_bytes(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }

    /// Digest of a complete byte slice
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        Self::finalize(&hasher)
    }

    /// Digest of everything `reader` yields
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self::finalize(&hasher))
    }

    /// Finish an incremental digest
    pub(crate) fn finalize(hasher: &blake3::Hasher) -> Self {
        let mut bytes = [0u8; CHECKSUM_SIZE];
        hasher.finalize_xof().fill(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Where a blob lives in the content log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentLocation {
    /// Number of content bytes
    pub size: u64,
    /// Absolute file offset of the first content byte
    pub offset: u64,
    /// Digest of the content bytes
    pub checksum: Checksum,
}

impl ContentLocation {
    /// One past the last content byte
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}
