//! Index Guard
//!
//! Serializes access to an index behind one lock with a bounded wait.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::warn;

use crate::error::{BinStoreError, Result};
use crate::location::ContentLocation;

use super::Index;

/// Single-actor wrapper around an [`Index`]
///
/// Every call waits at most `timeout` for the lock and fails with
/// `OperationTimedOut` otherwise, without touching the index. Callers under
/// heavy contention are expected to retry.
pub struct IndexGuard<I> {
    inner: Mutex<I>,
    timeout: Duration,
}

impl<I: Index> IndexGuard<I> {
    pub fn new(index: I, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(index),
            timeout,
        }
    }

    pub fn add(&self, key: &str, location: ContentLocation) -> Result<()> {
        self.lock("add")?.add(key, location)
    }

    pub fn get(&self, key: &str) -> Result<ContentLocation> {
        self.lock("get")?.get(key)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.lock("contains")?.contains(key))
    }

    pub fn commit(&self) -> Result<()> {
        self.lock("commit")?.commit()
    }

    pub fn rollback(&self) -> Result<()> {
        self.lock("rollback")?.rollback()
    }

    /// Configured lock wait
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Release the wrapped index
    pub fn into_inner(self) -> I {
        self.inner.into_inner()
    }

    fn lock(&self, operation: &str) -> Result<MutexGuard<'_, I>> {
        self.inner.try_lock_for(self.timeout).ok_or_else(|| {
            warn!(operation, timeout = ?self.timeout, "index lock wait timed out");
            BinStoreError::OperationTimedOut(self.timeout)
        })
    }
}
