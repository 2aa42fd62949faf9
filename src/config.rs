//! Configuration for binstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BinStoreError, Result};

/// Default index file name inside the working folder
pub const DEFAULT_INDEX_FILE_NAME: &str = "index.bin";

/// Default content file name inside the working folder
pub const DEFAULT_STORAGE_FILE_NAME: &str = "storage.bin";

/// Default bounded wait for the index guard
pub const DEFAULT_INDEX_TIMEOUT: Duration = Duration::from_secs(90);

/// Default initial index capacity (16 MiB)
pub const DEFAULT_INDEX_CAPACITY: u64 = 16 * 1024 * 1024;

/// Default initial content capacity (1 GiB)
pub const DEFAULT_STORAGE_CAPACITY: u64 = 1024 * 1024 * 1024;

/// Default streaming chunk size for appends (16 KiB)
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16 * 1024;

/// Main configuration for a binstore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Folder holding both log files
    /// Internal structure:
    ///   {working_folder}/
    ///     ├── index.bin        (key → location log)
    ///     └── storage.bin      (content log)
    pub working_folder: PathBuf,

    /// File name of the index log
    pub index_file_name: String,

    /// File name of the content log
    pub storage_file_name: String,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// How long an index operation waits for the guard lock
    pub index_timeout: Duration,

    /// Initial index capacity in bytes (excluding the cursor header)
    pub index_capacity: u64,

    // -------------------------------------------------------------------------
    // Content Configuration
    // -------------------------------------------------------------------------
    /// Initial content capacity in bytes (excluding the cursor header)
    pub storage_capacity: u64,

    /// Chunk size used when streaming content into the store
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_folder: PathBuf::from("./binstore_data"),
            index_file_name: DEFAULT_INDEX_FILE_NAME.to_string(),
            storage_file_name: DEFAULT_STORAGE_FILE_NAME.to_string(),
            index_timeout: DEFAULT_INDEX_TIMEOUT,
            index_capacity: DEFAULT_INDEX_CAPACITY,
            storage_capacity: DEFAULT_STORAGE_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Full path of the index log
    pub fn index_path(&self) -> PathBuf {
        self.working_folder.join(&self.index_file_name)
    }

    /// Full path of the content log
    pub fn storage_path(&self) -> PathBuf {
        self.working_folder.join(&self.storage_file_name)
    }

    /// Reject settings the logs cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.index_file_name.is_empty() {
            return Err(BinStoreError::Config("index file name is empty".to_string()));
        }
        if self.storage_file_name.is_empty() {
            return Err(BinStoreError::Config(
                "storage file name is empty".to_string(),
            ));
        }
        if self.index_file_name == self.storage_file_name {
            return Err(BinStoreError::Config(format!(
                "index and storage share the file name {:?}",
                self.index_file_name
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(BinStoreError::Config(
                "read buffer size must be positive".to_string(),
            ));
        }
        if self.index_timeout.is_zero() {
            return Err(BinStoreError::Config(
                "index timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the working folder (root for both logs)
    pub fn working_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_folder = path.into();
        self
    }

    /// Set the index file name
    pub fn index_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_file_name = name.into();
        self
    }

    /// Set the content file name
    pub fn storage_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.storage_file_name = name.into();
        self
    }

    /// Set the index guard timeout
    pub fn index_timeout(mut self, timeout: Duration) -> Self {
        self.config.index_timeout = timeout;
        self
    }

    /// Set the initial index capacity (in bytes)
    pub fn index_capacity(mut self, bytes: u64) -> Self {
        self.config.index_capacity = bytes;
        self
    }

    /// Set the initial content capacity (in bytes)
    pub fn storage_capacity(mut self, bytes: u64) -> Self {
        self.config.storage_capacity = bytes;
        self
    }

    /// Set the streaming chunk size (in bytes)
    pub fn read_buffer_size(mut self, bytes: usize) -> Self {
        self.config.read_buffer_size = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
