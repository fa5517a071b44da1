//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::expiry::{Clock, SystemClock};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest body a frame may declare; anything bigger is treated as garbage
pub const MAX_BODY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Store a serialized envelope under a key
    Set { key: String, value: String },

    /// Remove a key
    Remove { key: String },
}

impl Operation {
    pub fn key(&self) -> &str {
        match self {
            Operation::Set { key, .. } | Operation::Remove { key } => key,
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self {
            lsn,
            operation,
            timestamp: SystemClock.now_millis(),
        }
    }

    /// Encode as a full frame: header followed by the bincode body
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let len = u32::try_from(body.len())
            .ok()
            .filter(|&len| len <= MAX_BODY_SIZE)
            .ok_or_else(|| StoreError::WalWrite(format!("entry of {} bytes is too large", body.len())))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&self.lsn.to_be_bytes());
        frame.extend_from_slice(&Self::compute_crc(&body).to_be_bytes());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode a full frame, verifying length, checksum and LSN
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::WalCorruption(format!(
                "frame of {} bytes is shorter than the header",
                bytes.len()
            )));
        }

        let (lsn, crc, len) = parse_header(&bytes[..HEADER_SIZE]);
        let body = &bytes[HEADER_SIZE..];
        if body.len() != len as usize {
            return Err(StoreError::WalCorruption(format!(
                "frame declares {} body bytes but carries {}",
                len,
                body.len()
            )));
        }

        Self::decode_body(lsn, crc, body)
    }

    /// CRC32 of an encoded body
    pub fn compute_crc(body: &[u8]) -> u32 {
        crc32fast::hash(body)
    }

    pub(crate) fn decode_body(lsn: u64, crc: u32, body: &[u8]) -> Result<Self> {
        if Self::compute_crc(body) != crc {
            return Err(StoreError::WalCorruption(format!("CRC mismatch at lsn {}", lsn)));
        }

        let entry: WalEntry = bincode::deserialize(body)?;
        if entry.lsn != lsn {
            return Err(StoreError::WalCorruption(format!(
                "header lsn {} does not match body lsn {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}

/// Split a header into (lsn, crc, body length)
pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&header[0..8]);
    crc.copy_from_slice(&header[8..12]);
    len.copy_from_slice(&header[12..16]);
    (u64::from_be_bytes(lsn), u32::from_be_bytes(crc), u32::from_be_bytes(len))
}
