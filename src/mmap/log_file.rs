//! Log File
//!
//! Owns one memory-mapped file and its capacity.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapOptions, MmapRaw};
use tracing::{debug, info};

use crate::error::{BinStoreError, Result};

use super::HEADER_SIZE;

/// A growable memory-mapped log file
///
/// ## Concurrency:
/// - `grow`/`store_cursor` need `&mut self` (they replace or rewrite shared state)
/// - `read` and `write_shared` work through `&self` so disjoint ranges can be
///   accessed from many threads at once
pub struct LogFile {
    /// Path of the backing file
    path: PathBuf,
    /// Backing file handle (kept open for resizing)
    file: File,
    /// Current mapping, always exactly `capacity` bytes long
    map: MmapRaw,
    /// Mapped size in bytes, header included
    capacity: u64,
}

impl LogFile {
    /// Open or create a log file
    ///
    /// The capacity is `requested_capacity + HEADER_SIZE`, raised to the
    /// length of an existing larger file. Fails with `NotEnoughDiskSpace`
    /// when the volume cannot hold that capacity.
    pub fn open(path: &Path, requested_capacity: u64) -> Result<Self> {
        let mut capacity = requested_capacity.checked_add(HEADER_SIZE).ok_or_else(|| {
            BinStoreError::InvalidArgument(format!(
                "capacity {} overflows with header",
                requested_capacity
            ))
        })?;

        if let Ok(metadata) = std::fs::metadata(path) {
            capacity = capacity.max(metadata.len());
        }

        ensure_free_space(path, capacity)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.metadata()?.len() < capacity {
            file.set_len(capacity)?;
        }

        let map = map_file(&file, capacity)?;

        debug!(path = %path.display(), capacity, "mapped log file");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            map,
            capacity,
        })
    }

    /// Mapped size in bytes, header included
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted cursor
    ///
    /// A stored zero means the log has never been committed and is reported
    /// as `HEADER_SIZE`.
    pub fn load_cursor(&self) -> Result<u64> {
        let mut header = [0u8; HEADER_SIZE as usize];
        self.read(0, &mut header)?;

        let raw = i64::from_le_bytes(header);
        if raw == 0 {
            return Ok(HEADER_SIZE);
        }

        let cursor = u64::try_from(raw).map_err(|_| {
            BinStoreError::Corruption(format!(
                "negative cursor {} in {}",
                raw,
                self.path.display()
            ))
        })?;

        if cursor < HEADER_SIZE || cursor > self.capacity {
            return Err(BinStoreError::Corruption(format!(
                "cursor {} outside [{}, {}] in {}",
                cursor,
                HEADER_SIZE,
                self.capacity,
                self.path.display()
            )));
        }

        Ok(cursor)
    }

    /// Persist `cursor` into the header and flush the header page
    pub fn store_cursor(&mut self, cursor: u64) -> Result<()> {
        let raw = i64::try_from(cursor).map_err(|_| {
            BinStoreError::InvalidArgument(format!("cursor {} exceeds i64", cursor))
        })?;
        self.write(0, &raw.to_le_bytes())?;
        self.map.flush_range(0, HEADER_SIZE as usize)?;
        Ok(())
    }

    /// Grow the mapping so that `required` bytes fit
    ///
    /// Doubles the capacity, clamping up to `required` when doubling is not
    /// enough. The free-space check runs before anything is touched, so a
    /// failed growth leaves the log unchanged. Returns whether growth happened.
    pub fn grow(&mut self, required: u64) -> Result<bool> {
        if required <= self.capacity {
            return Ok(false);
        }

        let mut new_capacity = self.capacity.saturating_mul(2);
        if new_capacity < required {
            new_capacity = required;
        }

        ensure_free_space(&self.path, new_capacity)?;

        // Written pages must reach the file before the old mapping goes away
        self.map.flush()?;

        self.file.set_len(new_capacity)?;
        self.map = map_file(&self.file, new_capacity)?;

        info!(
            path = %self.path.display(),
            old_capacity = self.capacity,
            new_capacity,
            "grew log file"
        );

        self.capacity = new_capacity;
        Ok(true)
    }

    /// Copy `buf.len()` bytes starting at `offset` out of the mapping
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = self.check_range(offset, buf.len())?;
        // SAFETY: the range is inside the mapping (checked above). Concurrent
        // writers only exist through `write_shared`, whose contract forbids
        // overlapping access.
        unsafe {
            std::ptr::copy_nonoverlapping(self.map.as_ptr().add(start), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    /// Write `data` at `offset` with exclusive access to the whole file
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        // SAFETY: `&mut self` rules out any other access to the mapping.
        unsafe { self.write_shared(offset, data) }
    }

    /// Write `data` at `offset` through a shared reference
    ///
    /// # Safety
    ///
    /// No other thread may read or write any byte of
    /// `[offset, offset + data.len())` while this call runs.
    pub unsafe fn write_shared(&self, offset: u64, data: &[u8]) -> Result<()> {
        let start = self.check_range(offset, data.len())?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), self.map.as_mut_ptr().add(start), data.len());
        Ok(())
    }

    /// Flush every dirty page of the mapping to the file
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<usize> {
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= self.capacity => Ok(offset as usize),
            _ => Err(BinStoreError::InvalidArgument(format!(
                "range [{}, +{}) outside capacity {} of {}",
                offset,
                len,
                self.capacity,
                self.path.display()
            ))),
        }
    }
}

fn map_file(file: &File, capacity: u64) -> Result<MmapRaw> {
    let len = usize::try_from(capacity).map_err(|_| {
        BinStoreError::InvalidArgument(format!("capacity {} exceeds address space", capacity))
    })?;
    Ok(MmapOptions::new().len(len).map_raw(file)?)
}

/// Fail with `NotEnoughDiskSpace` unless the volume holding `path` has at
/// least `required` free bytes
fn ensure_free_space(path: &Path, required: u64) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let available = fs4::available_space(dir)?;
    if available < required {
        return Err(BinStoreError::NotEnoughDiskSpace {
            required,
            available,
        });
    }
    Ok(())
}
