//! Storage Module
//!
//! The key-value engine the expiring store writes through.
//!
//! ## Responsibilities
//! - Atomic single-key set/get/remove of string values
//! - Reject writes beyond capacity with `StoreError::QuotaExceeded`
//! - Enumerate keys for expired-entry sweeps
//!
//! ## Engines
//! - [`MemoryStorage`]: in-process map with a byte quota
//! - [`FileStorage`]: memory image fronted by a write-ahead log on disk

mod file;
mod memory;

use std::sync::Arc;

use crate::error::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// String key-value engine consumed by [`ExpiringStore`](crate::ExpiringStore)
pub trait StorageEngine {
    /// Store `value` under `key`, replacing any previous value.
    /// Fails with `StoreError::QuotaExceeded` when capacity would be exceeded.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Read the value under `key`, `None` if absent
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Delete `key`; deleting an absent key is not an error
    fn remove_item(&self, key: &str) -> Result<()>;

    /// All keys currently stored
    fn keys(&self) -> Result<Vec<String>>;
}

impl<S: StorageEngine + ?Sized> StorageEngine for Arc<S> {
    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}
