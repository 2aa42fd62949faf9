//! Store Module
//!
//! Append-only content log. Blobs are laid out back to back after the cursor
//! header and addressed by `(offset, size)`; nothing is ever rewritten.
//!
//! ## Responsibilities
//! - Reserve disjoint byte ranges for concurrent appends (atomic cursor)
//! - Stream content into the mapping in fixed-size chunks
//! - Compute the content checksum while streaming
//! - Grow the mapping on demand
//!
//! ## File Format
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────────┐
//! │ Cursor (8)   │ Blob 1       │ Blob 2       │  ...    │
//! └──────────────┴──────────────┴──────────────┴─────────┘
//!                ^ offset 8     ^ offset 8 + size1
//! ```

mod blob_store;
mod content;

pub use blob_store::BlobStore;
pub use content::{from_bytes, Content};
