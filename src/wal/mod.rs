//! Write-Ahead Log (WAL) Module
//!
//! Provides durability for the file storage engine through append-only logging.
//!
//! ## Responsibilities
//! - Append a log entry before any mutation of the in-memory image
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! All header fields are big-endian. `Data` is the bincode-encoded entry and
//! the CRC covers `Data` only.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE, MAX_BODY_SIZE};
pub use reader::{Frame, WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::{LogFile, WalWriter};
