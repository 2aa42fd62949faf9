//! Mapped Log Module
//!
//! A growable memory-mapped file with a persisted append cursor. Both the
//! content store and the index are built on top of it.
//!
//! ## Responsibilities
//! - Create/open the backing file at a requested capacity
//! - Read and persist the append cursor in the fixed header
//! - Grow the mapping on demand (double, then clamp up to the requirement)
//! - Refuse to grow past the free space of the containing volume
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (8 bytes)                        │
//! │   Cursor: i64 little-endian             │
//! │   (0 = empty log, read as 8)            │
//! ├─────────────────────────────────────────┤
//! │ Records (owned by the log on top)       │
//! │   ... up to the persisted cursor ...    │
//! ├─────────────────────────────────────────┤
//! │ Unused capacity (zero-filled)           │
//! └─────────────────────────────────────────┘
//! ```

mod log_file;

pub use log_file::LogFile;

/// Size of the cursor header at the start of every log file
pub const HEADER_SIZE: u64 = 8;
