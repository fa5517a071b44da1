//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::{Frame, WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped (a torn tail counts as one)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

struct Scan {
    entries: Vec<WalEntry>,
    result: RecoveryResult,
    valid_len: u64,
    torn: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Skip entries whose checksum does not match
    /// 3. Truncate a partial write at the end
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut scan = Self::scan(path)?;

        if scan.torn {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
            scan.result.was_truncated = true;
        }

        Ok((scan.entries, scan.result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Ok(Self::scan(path)?.result)
    }

    fn scan(path: &Path) -> Result<Scan> {
        let mut reader = WalReader::open(path)?;
        let mut scan = Scan {
            entries: Vec::new(),
            result: RecoveryResult::default(),
            valid_len: 0,
            torn: false,
        };

        loop {
            match reader.next_frame()? {
                Frame::Entry(entry) => {
                    scan.result.entries_recovered += 1;
                    scan.result.last_lsn = scan.result.last_lsn.max(entry.lsn);
                    scan.entries.push(entry);
                }
                Frame::Corrupted { lsn } => {
                    tracing::warn!(lsn, "skipping WAL entry with bad checksum");
                    scan.result.entries_corrupted += 1;
                }
                Frame::Torn => {
                    scan.result.entries_corrupted += 1;
                    scan.torn = true;
                    break;
                }
                Frame::End => break,
            }
            scan.valid_len = reader.position();
        }

        Ok(scan)
    }
}
