//! AFS index: header, entry table and metadata pointer

use crate::afs::error::{AfsError, Result};
use crate::afs::header::{AfsHeader, ENTRY_INFO_SIZE, EntryInfo, HEADER_SIZE};
use crate::afs::layout;
use crate::afs::metadata::METADATA_RECORD_SIZE;
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Parsed AFS index
///
/// The index is everything before the payload region: the header, one
/// [`EntryInfo`] per entry, and a trailing [`EntryInfo`] pointing at the
/// metadata table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfsIndex {
    /// File header
    pub header: AfsHeader,
    /// Entry table, indexed by entry ID
    pub entries: Vec<EntryInfo>,
    /// Location of the metadata table; `size == 0` means there is none
    pub metadata: EntryInfo,
}

/// Decode `count` consecutive entry rows from `data`
pub fn parse_entry_table(data: &[u8], count: usize) -> Result<Vec<EntryInfo>> {
    let expected = count * ENTRY_INFO_SIZE;
    if data.len() < expected {
        return Err(AfsError::TruncatedData {
            expected,
            actual: data.len(),
        });
    }

    let mut cursor = Cursor::new(data);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(EntryInfo::read(&mut cursor)?);
    }
    Ok(entries)
}

/// Encode entry rows back to back
pub fn encode_entry_table(entries: &[EntryInfo]) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(entries.len() * ENTRY_INFO_SIZE);
    let mut cursor = Cursor::new(&mut buffer);
    for entry in entries {
        entry.write(&mut cursor)?;
    }
    Ok(buffer)
}

impl AfsIndex {
    /// Create an index for the given rows
    pub fn new(entries: Vec<EntryInfo>, metadata: EntryInfo) -> Self {
        Self {
            header: AfsHeader::new(entries.len() as u32),
            entries,
            metadata,
        }
    }

    /// Encoded length of an index with `entry_count` entries
    pub const fn encoded_len_for(entry_count: usize) -> usize {
        HEADER_SIZE + (entry_count + 1) * ENTRY_INFO_SIZE
    }

    /// Encoded length of this index
    pub fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.entries.len())
    }

    /// Number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// True if the archive carries a metadata table
    pub const fn has_metadata(&self) -> bool {
        self.metadata.size != 0
    }

    /// Decode and validate only the fixed header
    pub fn parse_header(data: &[u8]) -> Result<AfsHeader> {
        if data.len() < HEADER_SIZE {
            return Err(AfsError::TruncatedData {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let header = AfsHeader::read(&mut Cursor::new(data))?;
        header.validate()?;
        Ok(header)
    }

    /// Parse an index from the start of an AFS file
    ///
    /// `data` only needs to cover the index itself; use
    /// [`AfsIndex::parse_header`] first to learn how many bytes that is.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Self::parse_header(data)?;
        let count = header.entry_count as usize;

        let expected = Self::encoded_len_for(count);
        if data.len() < expected {
            return Err(AfsError::TruncatedData {
                expected,
                actual: data.len(),
            });
        }

        // The metadata pointer is stored as one extra row after the entries.
        let mut rows = parse_entry_table(&data[header.table_offset()..], count + 1)?;
        let metadata = rows.pop().unwrap_or_default();

        let index = Self {
            header,
            entries: rows,
            metadata,
        };
        index.validate()?;
        Ok(index)
    }

    /// Build the index to binary data
    pub fn build(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut buffer = Vec::with_capacity(self.encoded_len());
        self.header.write(&mut Cursor::new(&mut buffer))?;
        buffer.extend_from_slice(&encode_entry_table(&self.entries)?);
        buffer.extend_from_slice(&encode_entry_table(std::slice::from_ref(&self.metadata))?);
        Ok(buffer)
    }

    /// Validate internal consistency (not file bounds)
    pub fn validate(&self) -> Result<()> {
        self.header.validate()?;

        if self.entries.len() != self.header.entry_count as usize {
            return Err(AfsError::EntryCountMismatch {
                expected: self.header.entry_count,
                actual: self.entries.len(),
            });
        }

        if self.has_metadata() {
            let expected = self.entries.len() * METADATA_RECORD_SIZE;
            if (self.metadata.size as usize) < expected {
                return Err(AfsError::MetadataTooSmall {
                    expected,
                    actual: self.metadata.size,
                });
            }
        }

        Ok(())
    }

    /// Reserved space of every entry in a file of `file_len` bytes
    ///
    /// Also checks that every region lies inside the file and that no two
    /// regions overlap.
    pub fn derive_reserved(&self, file_len: u64) -> Result<Vec<u32>> {
        layout::derive_reserved(self, file_len)
    }
}

impl crate::AfsterFormat for AfsIndex {
    fn parse(data: &[u8]) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Self::parse(data).map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }

    fn build(&self) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
        self.build()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }
}
