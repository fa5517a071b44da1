//! In-memory storage engine
//!
//! BTreeMap-based table with RwLock for concurrency and a byte quota.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, StoreError};

use super::StorageEngine;

/// In-process key-value engine
///
/// ## Concurrency:
/// - `data`: RwLock (many concurrent readers, exclusive writer)
/// - `size`: only updated while the write lock is held, read lock-free
pub struct MemoryStorage {
    data: RwLock<BTreeMap<String, String>>,

    /// Approximate footprint: sum of key bytes + value bytes
    size: AtomicUsize,

    /// Maximum footprint in bytes
    quota: usize,
}

impl MemoryStorage {
    /// Create an empty engine with the given quota in bytes
    pub fn new(quota: usize) -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            quota,
        }
    }

    /// Create an engine with no practical capacity limit
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Footprint after writing `key`/`value`, or `QuotaExceeded`.
    ///
    /// Callers that need check-then-write atomicity must serialize their
    /// writers themselves.
    pub fn check_quota(&self, key: &str, value: &str) -> Result<usize> {
        let data = self.data.read();
        self.projected_size(&data, key, value)
    }

    /// Insert without a quota check (used when replaying a log)
    pub(crate) fn restore(&self, key: String, value: String) {
        let mut data = self.data.write();
        let existing = data.get(&key).map(|old| key.len() + old.len()).unwrap_or(0);
        let added = key.len() + value.len();

        data.insert(key, value);
        let new_size = self.size.load(Ordering::Acquire) - existing + added;
        self.size.store(new_size, Ordering::Release);
    }

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Current footprint in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::Release);
    }

    /// Snapshot of all entries in key order
    pub fn entries(&self) -> Vec<(String, String)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn projected_size(&self, data: &BTreeMap<String, String>, key: &str, value: &str) -> Result<usize> {
        let existing = data.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
        let requested = self.size.load(Ordering::Acquire) - existing + key.len() + value.len();

        if requested > self.quota {
            return Err(StoreError::QuotaExceeded {
                requested,
                quota: self.quota,
            });
        }
        Ok(requested)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl StorageEngine for MemoryStorage {
    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write();
        let new_size = self.projected_size(&data, key, value)?;

        data.insert(key.to_owned(), value.to_owned());
        self.size.store(new_size, Ordering::Release);
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut data = self.data.write();
        if let Some(old) = data.remove(key) {
            self.size.fetch_sub(key.len() + old.len(), Ordering::AcqRel);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.data.read().keys().cloned().collect())
    }
}
