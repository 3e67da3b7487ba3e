//! AFS header and index rows

use crate::MAX_ENTRIES;
use crate::afs::error::{AfsError, Result};
use binrw::{BinRead, BinWrite};

/// Magic signature at the start of every AFS file
pub const AFS_MAGIC: [u8; 4] = *b"AFS\0";

/// Size of [`AfsHeader`] in bytes
pub const HEADER_SIZE: usize = 8;

/// Size of one [`EntryInfo`] row in bytes
pub const ENTRY_INFO_SIZE: usize = 8;

/// AFS file header
///
/// - Magic signature "AFS\0" (4 bytes)
/// - Entry count (4 bytes, little-endian)
///
/// The entry table starts right after the header, at offset
/// [`HEADER_SIZE`].
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct AfsHeader {
    /// Magic signature, always "AFS\0"
    pub magic: [u8; 4],

    /// Number of entries in the archive
    pub entry_count: u32,
}

impl AfsHeader {
    /// Create a header for `entry_count` entries
    pub const fn new(entry_count: u32) -> Self {
        Self {
            magic: AFS_MAGIC,
            entry_count,
        }
    }

    /// Offset of the entry table from the start of the file
    pub const fn table_offset(&self) -> usize {
        HEADER_SIZE
    }

    /// Validate the header fields
    pub fn validate(&self) -> Result<()> {
        if self.magic != AFS_MAGIC {
            return Err(AfsError::InvalidMagic(self.magic));
        }

        if self.entry_count as usize > MAX_ENTRIES {
            return Err(AfsError::TooManyEntries {
                count: self.entry_count as usize,
                max: MAX_ENTRIES,
            });
        }

        Ok(())
    }
}

/// One row of the entry table: where a payload lives and how long it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct EntryInfo {
    /// Byte offset from the start of the file
    pub offset: u32,
    /// Payload length in bytes
    pub size: u32,
}

impl EntryInfo {
    /// Create a row
    pub const fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    /// One past the last payload byte
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}
