//! Index record codec
//!
//! Fixed 44-byte header followed by the key's UTF-8 bytes, all integers
//! signed little-endian.

use crate::location::{Checksum, CHECKSUM_SIZE};

/// keyOffset (8) + keySize (4) + size (8) + offset (8) + checksum (16)
pub const RECORD_HEADER_SIZE: usize = 8 + 4 + 8 + 8 + CHECKSUM_SIZE;

/// Header fields exactly as stored; validation happens during replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub key_offset: i64,
    pub key_size: i32,
    pub size: i64,
    pub offset: i64,
    pub checksum: Checksum,
}

impl RawHeader {
    /// `keyOffset == 0` marks the end of the log
    pub fn is_sentinel(&self) -> bool {
        self.key_offset == 0
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.key_offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.key_size.to_le_bytes());
        buf[12..20].copy_from_slice(&self.size.to_le_bytes());
        buf[20..28].copy_from_slice(&self.offset.to_le_bytes());
        buf[28..44].copy_from_slice(self.checksum.as_bytes());
        buf
    }

    pub fn decode(buf: &[u8; RECORD_HEADER_SIZE]) -> Self {
        let mut key_offset = [0u8; 8];
        let mut key_size = [0u8; 4];
        let mut size = [0u8; 8];
        let mut offset = [0u8; 8];
        let mut checksum = [0u8; CHECKSUM_SIZE];

        key_offset.copy_from_slice(&buf[0..8]);
        key_size.copy_from_slice(&buf[8..12]);
        size.copy_from_slice(&buf[12..20]);
        offset.copy_from_slice(&buf[20..28]);
        checksum.copy_from_slice(&buf[28..44]);

        Self {
            key_offset: i64::from_le_bytes(key_offset),
            key_size: i32::from_le_bytes(key_size),
            size: i64::from_le_bytes(size),
            offset: i64::from_le_bytes(offset),
            checksum: Checksum::from_bytes(checksum),
        }
    }
}
