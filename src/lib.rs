//! # binstore
//!
//! An embedded key → blob store with:
//! - Two append-only memory-mapped logs (content and index)
//! - Index rebuilt in memory by replaying its log on open
//! - Lock-free range reservation for concurrent appends
//! - Streaming checksums computed while content is copied
//! - Commit/rollback over the persisted log cursors
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        BinStorage                            │
//! │        add / get / contains / commit / rollback / close      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  BlobStore  │          │ IndexGuard  │
//!   │  (RwLock +  │          │ (Mutex with │
//!   │   atomic)   │          │   timeout)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        ▼
//!          │                 ┌─────────────┐
//!          │                 │  BlobIndex  │
//!          │                 └──────┬──────┘
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   LogFile   │          │   LogFile   │
//!   │ storage.bin │          │  index.bin  │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod location;
pub mod mmap;
pub mod index;
pub mod store;
pub mod engine;
pub mod loader;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BinStoreError, Result};
pub use config::Config;
pub use engine::BinStorage;
pub use location::{Checksum, ContentLocation};
pub use store::Content;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of binstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
