//! Configuration for timestore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Main configuration for a timestore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Expiration Configuration
    // -------------------------------------------------------------------------
    /// Delete an entry when a read finds it expired
    pub delete_expired_on_read: bool,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Capacity of a storage engine, counted as key bytes + value bytes
    pub quota_bytes: usize,

    /// Root directory for the file engine
    /// Internal structure:
    ///   {data_dir}/
    ///     └── store.wal        (write-ahead log)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the WAL
    pub sync_strategy: SyncStrategy,

    /// Stale log entries tolerated before the file engine compacts
    pub compact_threshold: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },

    /// fsync only when `sync` is called explicitly
    Manual,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delete_expired_on_read: true,
            quota_bytes: 5 * 1024 * 1024, // 5 MB
            data_dir: PathBuf::from("./timestore_data"),
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            compact_threshold: 1000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings no engine can work with
    pub fn validate(&self) -> Result<()> {
        if self.quota_bytes == 0 {
            return Err(StoreError::Config("quota_bytes must be greater than zero".into()));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(StoreError::Config("sync count must be greater than zero".into()));
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
    /// Whether reads delete the expired entries they find
    pub fn delete_expired_on_read(mut self, enabled: bool) -> Self {
        self.config.delete_expired_on_read = enabled;
        self
    }

    /// Set the storage quota (in bytes)
    pub fn quota_bytes(mut self, bytes: usize) -> Self {
        self.config.quota_bytes = bytes;
        self
    }

    /// Set the data directory (file engine only)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set how many stale log entries trigger compaction
    pub fn compact_threshold(mut self, entries: usize) -> Self {
        self.config.compact_threshold = entries;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
