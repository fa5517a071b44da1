//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, StoreError};

use super::entry::parse_header;
use super::{WalEntry, HEADER_SIZE, MAX_BODY_SIZE};

/// One step of a sequential WAL scan
#[derive(Debug, PartialEq)]
pub enum Frame {
    /// A valid entry
    Entry(WalEntry),

    /// A complete frame whose body failed verification; the scan can continue
    Corrupted { lsn: u64 },

    /// An incomplete or unreadable frame; nothing after it can be trusted
    Torn,

    /// Clean end of file
    End,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Byte offset just past the last complete frame
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Byte offset just past the last complete frame read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next frame, classifying damage instead of failing on it
    pub fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(Frame::End),
            n if n < HEADER_SIZE => return Ok(Frame::Torn),
            _ => {}
        }

        let (lsn, crc, len) = parse_header(&header);
        if len > MAX_BODY_SIZE {
            return Ok(Frame::Torn);
        }

        let mut body = vec![0u8; len as usize];
        if read_full(&mut self.reader, &mut body)? < body.len() {
            return Ok(Frame::Torn);
        }
        self.position += (HEADER_SIZE + body.len()) as u64;

        match WalEntry::decode_body(lsn, crc, &body) {
            Ok(entry) => Ok(Frame::Entry(entry)),
            Err(_) => Ok(Frame::Corrupted { lsn }),
        }
    }

    /// Read the next entry from the WAL
    ///
    /// Any damaged frame is reported as `StoreError::WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Corrupted { lsn } => Err(StoreError::WalCorruption(format!(
                "entry with lsn {} failed verification",
                lsn
            ))),
            Frame::Torn => Err(StoreError::WalCorruption(format!(
                "partial entry after offset {}",
                self.position
            ))),
        }
    }

    /// Iterate over entries, stopping after the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
