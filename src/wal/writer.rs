//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! An append either lands whole or not at all: when the write, flush or
//! sync fails, the file is cut back to its last committed length and the
//! buffered bytes are dropped. If even that fails the writer refuses all
//! further appends.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{Result, StoreError};

use super::{Operation, WalEntry, WalRecovery};

/// File operations the writer needs on top of `Write`
pub trait LogFile: Write {
    /// Current length in bytes
    fn size(&self) -> io::Result<u64>;

    fn set_len(&self, len: u64) -> io::Result<()>;

    fn sync_data(&self) -> io::Result<()>;
}

impl LogFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Writes entries to the WAL file
pub struct WalWriter<F: LogFile = File> {
    /// `None` once a rollback has failed
    buffer: Option<BufWriter<F>>,
    path: PathBuf,
    current_lsn: u64,
    sync_strategy: SyncStrategy,

    /// File length after the last committed frame
    committed_len: u64,

    /// Entries appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, continuing after its last valid LSN
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn
        } else {
            0
        };
        Self::open_at(path, sync_strategy, last_lsn)
    }

    /// Open or create a WAL file whose last LSN is already known
    pub fn open_at(path: &Path, sync_strategy: SyncStrategy, last_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::with_file(file, path, sync_strategy, last_lsn)
    }

    /// Create an empty WAL file, replacing any existing one
    pub fn create(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        File::create(path)?;
        Self::open_at(path, sync_strategy, 0)
    }
}

impl<F: LogFile> WalWriter<F> {
    /// Wrap an already open log file positioned for appending
    pub fn with_file(file: F, path: &Path, sync_strategy: SyncStrategy, last_lsn: u64) -> Result<Self> {
        let committed_len = file.size()?;
        Ok(Self {
            buffer: Some(BufWriter::new(file)),
            path: path.to_path_buf(),
            current_lsn: last_lsn,
            sync_strategy,
            committed_len,
            unsynced: 0,
        })
    }

    /// Append an operation to the WAL, returning its LSN
    ///
    /// The frame is handed to the OS before returning; fsync follows the
    /// sync strategy. On error nothing of the frame remains and the LSN is
    /// not consumed.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn + 1;
        let frame = WalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self.write_frame(&frame) {
            tracing::warn!(lsn, error = %e, "WAL append failed, rolling back");
            if let Err(rollback) = self.roll_back() {
                tracing::error!(path = %self.path.display(), error = %rollback, "WAL rollback failed, writer disabled");
            }
            return Err(e);
        }

        self.committed_len += frame.len() as u64;
        self.current_lsn = lsn;
        Ok(lsn)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let buffer = self.buffer_mut()?;
        buffer
            .write_all(frame)
            .and_then(|_| buffer.flush())
            .map_err(|e| StoreError::WalWrite(e.to_string()))?;

        let sync_due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
            SyncStrategy::Manual => false,
        };

        if sync_due {
            self.sync()
        } else {
            self.unsynced += 1;
            Ok(())
        }
    }

    /// Drop buffered bytes and cut the file back to `committed_len`
    fn roll_back(&mut self) -> Result<()> {
        if let Some(buffer) = self.buffer.take() {
            let (file, _unwritten) = buffer.into_parts();
            file.set_len(self.committed_len)?;
            self.buffer = Some(BufWriter::new(file));
        }
        Ok(())
    }

    fn buffer_mut(&mut self) -> Result<&mut BufWriter<F>> {
        let path = &self.path;
        self.buffer
            .as_mut()
            .ok_or_else(|| StoreError::WalWrite(format!("{} is unusable after a failed rollback", path.display())))
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        let buffer = self.buffer_mut()?;
        buffer.flush()?;
        buffer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// False once a failed append could not be rolled back
    pub fn is_usable(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
