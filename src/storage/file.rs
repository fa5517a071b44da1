//! File-backed storage engine
//!
//! An in-memory image of every key, fronted by a write-ahead log so that the
//! contents survive restarts.
//!
//! ## Write Path
//! 1. Acquire the log lock (serializes writers)
//! 2. Check the quota against the image
//! 3. Append to the WAL
//! 4. Apply to the image
//!
//! Reads go straight to the image.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::{Config, SyncStrategy};
use crate::error::Result;
use crate::wal::{Operation, WalRecovery, WalWriter};

use super::{MemoryStorage, StorageEngine};

/// Writer state guarded by the log lock
struct LogState {
    writer: WalWriter,

    /// Frames currently in the log file, valid or not
    frames: usize,
}

/// Persistent key-value engine
pub struct FileStorage {
    config: Config,
    wal_path: PathBuf,
    image: MemoryStorage,
    log: Mutex<LogState>,
}

impl FileStorage {
    const WAL_FILENAME: &'static str = "store.wal";
    const COMPACT_SUFFIX: &'static str = "compact";

    /// Open or create a store under `config.data_dir`
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Recover and replay the WAL if it exists
    /// 3. Compact if the log carries too many stale frames
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let image = MemoryStorage::new(config.quota_bytes);

        let (frames, last_lsn) = if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    truncated = recovery.was_truncated,
                    "WAL recovery complete"
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Set { key, value } => image.restore(key, value),
                    Operation::Remove { key } => image.remove_item(&key)?,
                }
            }

            let frames = (recovery.entries_recovered + recovery.entries_corrupted) as usize;
            (frames, recovery.last_lsn)
        } else {
            (0, 0)
        };

        let writer = WalWriter::open_at(&wal_path, config.sync_strategy, last_lsn)?;
        let storage = Self {
            config,
            wal_path,
            image,
            log: Mutex::new(LogState { writer, frames }),
        };

        {
            let mut log = storage.log.lock();
            if storage.is_stale(&log) {
                storage.compact_locked(&mut log)?;
            }
        }

        Ok(storage)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Rewrite the log so it holds exactly one frame per live key
    pub fn compact(&self) -> Result<()> {
        let mut log = self.log.lock();
        self.compact_locked(&mut log)
    }

    /// Force the log to disk
    pub fn sync(&self) -> Result<()> {
        self.log.lock().writer.sync()
    }

    /// Close the store gracefully, syncing the log
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// Current footprint in bytes
    pub fn size(&self) -> usize {
        self.image.size()
    }

    /// Frames in the log file
    pub fn log_frames(&self) -> usize {
        self.log.lock().frames
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn is_stale(&self, log: &LogState) -> bool {
        log.frames.saturating_sub(self.image.len()) > self.config.compact_threshold
    }

    /// Compact after a write; the write itself already succeeded
    fn compact_if_stale(&self, log: &mut LogState) {
        if self.is_stale(log) {
            if let Err(e) = self.compact_locked(log) {
                tracing::warn!(error = %e, "WAL compaction failed");
            }
        }
    }

    /// Called with the log lock held
    fn compact_locked(&self, log: &mut LogState) -> Result<()> {
        let temp_path = self.wal_path.with_extension(Self::COMPACT_SUFFIX);
        let entries = self.image.entries();
        let before = log.frames;

        {
            let mut snapshot = WalWriter::create(&temp_path, SyncStrategy::Manual)?;
            for (key, value) in &entries {
                snapshot.append(Operation::Set {
                    key: key.clone(),
                    value: value.clone(),
                })?;
            }
            snapshot.sync()?;
        }

        // Sync the old log first so nothing buffered lands after the rename
        log.writer.sync()?;
        fs::rename(&temp_path, &self.wal_path)?;

        log.writer = WalWriter::open_at(&self.wal_path, self.config.sync_strategy, entries.len() as u64)?;
        log.frames = entries.len();

        tracing::debug!(before, after = log.frames, "WAL compacted");
        Ok(())
    }
}

impl StorageEngine for FileStorage {
    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut log = self.log.lock();

        self.image.check_quota(key, value)?;
        log.writer.append(Operation::Set {
            key: key.to_owned(),
            value: value.to_owned(),
        })?;
        log.frames += 1;
        self.image.restore(key.to_owned(), value.to_owned());

        self.compact_if_stale(&mut log);
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.image.get_item(key)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut log = self.log.lock();

        if self.image.get_item(key)?.is_none() {
            return Ok(());
        }

        log.writer.append(Operation::Remove { key: key.to_owned() })?;
        log.frames += 1;
        self.image.remove_item(key)?;

        self.compact_if_stale(&mut log);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.image.keys()
    }
}
