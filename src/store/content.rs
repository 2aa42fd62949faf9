//! Content sources
//!
//! The store allocates its byte range before streaming, so every source has
//! to know its total length up front.

use std::fs::File;
use std::io::{self, Cursor, Read};

use bytes::Bytes;

/// A readable blob whose length is known before reading starts
pub trait Content: Read {
    /// Total number of bytes the source will yield
    fn content_len(&self) -> io::Result<u64>;
}

impl Content for &[u8] {
    fn content_len(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl Content for File {
    fn content_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl Content for &File {
    fn content_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// Remaining bytes after the cursor's position
impl<T: AsRef<[u8]>> Content for Cursor<T> {
    fn content_len(&self) -> io::Result<u64> {
        let total = self.get_ref().as_ref().len() as u64;
        Ok(total.saturating_sub(self.position()))
    }
}

impl<C: Content + ?Sized> Content for &mut C {
    fn content_len(&self) -> io::Result<u64> {
        (**self).content_len()
    }
}

/// Owned in-memory blobs
pub fn from_bytes(data: impl Into<Bytes>) -> Cursor<Bytes> {
    Cursor::new(data.into())
}
