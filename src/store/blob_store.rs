//! Blob Store
//!
//! Append-only content log over a growable mapping.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{BinStoreError, Result};
use crate::location::{Checksum, ContentLocation};
use crate::mmap::{LogFile, HEADER_SIZE};

use super::Content;

/// Largest offset the signed on-disk cursor can hold
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Append-only content log
///
/// ## Concurrency:
/// - `cursor`: atomic, each append advances it past a disjoint range
/// - `pending`: ranges whose appends are still streaming; `get` refuses any
///   location overlapping one of them
/// - `log`: RwLock, chunk writes and reads take the shared side, growth and
///   header writes (commit/rollback) take the exclusive side
/// - All methods use `&self`
pub struct BlobStore {
    /// Backing mapping; replaced on growth
    log: RwLock<LogFile>,

    /// Next free byte (may run ahead of the persisted header)
    cursor: AtomicU64,

    /// In-flight reservations, `start → end`
    pending: Mutex<BTreeMap<u64, u64>>,

    /// Cursor as persisted when this session opened the file
    checkpoint: u64,

    /// Streaming chunk size
    read_buffer_size: usize,
}

impl BlobStore {
    /// Open or create a content log
    ///
    /// `capacity` excludes the cursor header; an existing larger file keeps
    /// its size.
    pub fn open(path: &Path, capacity: u64, read_buffer_size: usize) -> Result<Self> {
        if read_buffer_size == 0 {
            return Err(BinStoreError::InvalidArgument(
                "read buffer size must be positive".to_string(),
            ));
        }

        let log = LogFile::open(path, capacity)?;
        let cursor = log.load_cursor()?;

        info!(
            path = %path.display(),
            capacity = log.capacity(),
            cursor,
            "opened blob store"
        );

        Ok(Self {
            log: RwLock::new(log),
            cursor: AtomicU64::new(cursor),
            pending: Mutex::new(BTreeMap::new()),
            checkpoint: cursor,
            read_buffer_size,
        })
    }

    /// Append a blob and return where it landed
    ///
    /// Steps:
    /// 1. Reserve `[cursor, cursor + len)` atomically
    /// 2. Grow the mapping if the range does not fit (exclusive section)
    /// 3. Stream the source in chunks, hashing as it goes
    pub fn append<C: Content>(&self, mut content: C) -> Result<ContentLocation> {
        let len = content.content_len()?;

        // Step 1: Reserve a disjoint range
        let start = self.reserve(len)?;
        let end = start + len;

        // Step 2: Make room
        if let Err(e) = self.ensure_capacity(end) {
            self.release(start, end, true);
            return Err(e);
        }

        // Step 3: Copy and hash
        let streamed = self.stream(&mut content, start, len);
        self.release(start, end, false);
        let checksum = streamed?;

        Ok(ContentLocation {
            size: len,
            offset: start,
            checksum,
        })
    }

    /// Copy the bytes of `location` out of the log
    ///
    /// A zero-size location always yields an empty buffer. Locations outside
    /// the written content, or overlapping an append that is still streaming,
    /// fail with `InvalidArgument`.
    pub fn get(&self, location: &ContentLocation) -> Result<Bytes> {
        if location.size == 0 {
            return Ok(Bytes::new());
        }

        self.check_readable(location)?;

        let len = usize::try_from(location.size).map_err(|_| {
            BinStoreError::InvalidArgument(format!(
                "content of {} bytes does not fit in memory",
                location.size
            ))
        })?;

        let mut buf = vec![0u8; len];
        self.log.read().read(location.offset, &mut buf)?;

        Ok(Bytes::from(buf))
    }

    /// Persist the current cursor, making every append so far durable
    pub fn commit(&self) -> Result<()> {
        let mut log = self.log.write();

        // A failed growth can leave the cursor past the mapped end
        let cursor = self.cursor.load(Ordering::SeqCst).min(log.capacity());

        log.flush()?;
        log.store_cursor(cursor)?;

        debug!(path = %log.path().display(), cursor, "committed blob store");
        Ok(())
    }

    /// Restore the cursor persisted when this session opened the file
    ///
    /// Commits made during the session are undone as well. The in-memory
    /// cursor keeps its value, so later appends never reuse a handed-out range.
    pub fn rollback(&self) -> Result<()> {
        let mut log = self.log.write();
        log.store_cursor(self.checkpoint)?;

        debug!(
            path = %log.path().display(),
            checkpoint = self.checkpoint,
            "rolled back blob store"
        );
        Ok(())
    }

    /// Flush outstanding pages and release the mapping
    ///
    /// Does not commit.
    pub fn close(self) -> Result<()> {
        let log = self.log.into_inner();
        log.flush()?;
        debug!(path = %log.path().display(), "closed blob store");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Next free byte in this session
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Cursor persisted when the file was opened
    pub fn checkpoint(&self) -> u64 {
        self.checkpoint
    }

    /// Mapped size in bytes, header included
    pub fn capacity(&self) -> u64 {
        self.log.read().capacity()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Advance the cursor by `len` and register the range as pending
    ///
    /// Both happen under `pending`, so `get` never sees a reserved range that
    /// is not registered yet. Fails without moving the cursor when the end
    /// would not fit the signed on-disk cursor.
    fn reserve(&self, len: u64) -> Result<u64> {
        let mut pending = self.pending.lock();

        let start = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cursor| {
                cursor.checked_add(len).filter(|&end| end <= MAX_OFFSET)
            })
            .map_err(|cursor| {
                BinStoreError::InvalidArgument(format!(
                    "content of {} bytes does not fit after offset {}",
                    len, cursor
                ))
            })?;

        if len > 0 {
            pending.insert(start, start + len);
        }
        Ok(start)
    }

    /// Unregister `[start, end)`; with `give_back`, also hand the range back
    /// to the cursor if nobody reserved past it meanwhile
    fn release(&self, start: u64, end: u64, give_back: bool) {
        let mut pending = self.pending.lock();

        if give_back {
            let _ = self
                .cursor
                .compare_exchange(end, start, Ordering::SeqCst, Ordering::SeqCst);
        }
        if end > start {
            pending.remove(&start);
        }
    }

    fn check_readable(&self, location: &ContentLocation) -> Result<()> {
        let pending = self.pending.lock();
        let cursor = self.cursor.load(Ordering::SeqCst);

        let end = location
            .offset
            .checked_add(location.size)
            .filter(|&end| location.offset >= HEADER_SIZE && end <= cursor)
            .ok_or_else(|| {
                BinStoreError::InvalidArgument(format!(
                    "location [{}, +{}) outside written content (cursor {})",
                    location.offset, location.size, cursor
                ))
            })?;

        // Ranges are disjoint, so only the last one starting before `end` can overlap
        if let Some((_, &busy_end)) = pending.range(..end).next_back() {
            if busy_end > location.offset {
                return Err(BinStoreError::InvalidArgument(format!(
                    "location [{}, +{}) is still being written",
                    location.offset, location.size
                )));
            }
        }
        Ok(())
    }

    fn ensure_capacity(&self, required: u64) -> Result<()> {
        if required <= self.log.read().capacity() {
            return Ok(());
        }

        // Blocks every chunk write and read until the remap is done
        self.log.write().grow(required)?;
        Ok(())
    }

    /// Double-buffered copy of `len` bytes from `source` to `start`
    ///
    /// Chunk i is written while chunk i+1 is fetched; chunk i enters the
    /// digest once chunk i+1 is in hand, and the last chunk once the source
    /// runs dry.
    fn stream<R: Read>(&self, source: R, start: u64, len: u64) -> Result<Checksum> {
        let mut source = source.take(len);

        let chunk_size = (self.read_buffer_size as u64).min(len.max(1)) as usize;
        let mut current = vec![0u8; chunk_size];
        let mut next = vec![0u8; chunk_size];

        let mut hasher = blake3::Hasher::new();
        let mut position = start;
        let mut filled = read_chunk(&mut source, &mut current)?;

        loop {
            if filled > 0 {
                self.write_chunk(position, &current[..filled])?;
                position += filled as u64;
            }

            let fetched = read_chunk(&mut source, &mut next)?;
            hasher.update(&current[..filled]);

            if fetched == 0 {
                break;
            }

            std::mem::swap(&mut current, &mut next);
            filled = fetched;
        }

        let written = position - start;
        if written != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("content ended after {} of {} bytes", written, len),
            )
            .into());
        }

        Ok(Checksum::finalize(&hasher))
    }

    fn write_chunk(&self, position: u64, chunk: &[u8]) -> Result<()> {
        let log = self.log.read();
        // SAFETY: the chunk lies inside the range this append reserved, which
        // no other append overlaps. The range stays in `pending` until the
        // append returns, and `get` refuses every location overlapping it.
        unsafe { log.write_shared(position, chunk) }
    }
}

/// Fill `buf` from `source`, stopping early only at end of input
fn read_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
