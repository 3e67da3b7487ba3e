//! AFS metadata table
//!
//! Each record is 0x30 bytes:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 0x20 | Name (NUL padded) |
//! | 0x20   | 0x0C | Last-modified [`Timestamp`] |
//! | 0x2C   | 4    | File size (little-endian) |

use crate::afs::error::{AfsError, Result};
use crate::{EntryName, Timestamp};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Size of one metadata record in bytes
pub const METADATA_RECORD_SIZE: usize = 0x30;

/// Per-entry metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct MetadataRecord {
    /// Entry name
    pub name: EntryName,
    /// Last-modified time; all zero when not recorded
    pub last_modified: Timestamp,
    /// Payload size as recorded by the writing tool
    pub file_size: u32,
}

impl MetadataRecord {
    /// Create a record
    pub fn new(name: EntryName, last_modified: Option<Timestamp>, file_size: u32) -> Self {
        Self {
            name,
            last_modified: Timestamp::from_option(last_modified),
            file_size,
        }
    }
}

/// Metadata table: one record per entry, in entry ID order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataTable {
    /// Records indexed by entry ID
    pub records: Vec<MetadataRecord>,
}

impl MetadataTable {
    /// Table of `count` blank records
    pub fn blank(count: usize) -> Self {
        Self {
            records: vec![MetadataRecord::default(); count],
        }
    }

    /// Encoded length of a table with `count` records
    pub const fn encoded_len_for(count: usize) -> usize {
        count * METADATA_RECORD_SIZE
    }

    /// Parse `count` records from the start of `data`
    ///
    /// Bytes past the last record are ignored; the table region of some
    /// archives is padded.
    pub fn parse(data: &[u8], count: usize) -> Result<Self> {
        let expected = Self::encoded_len_for(count);
        if data.len() < expected {
            return Err(AfsError::TruncatedData {
                expected,
                actual: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(MetadataRecord::read(&mut cursor)?);
        }
        Ok(Self { records })
    }

    /// Build the table to binary data
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(Self::encoded_len_for(self.records.len()));
        let mut cursor = Cursor::new(&mut buffer);
        for record in &self.records {
            record.write(&mut cursor)?;
        }
        Ok(buffer)
    }
}
