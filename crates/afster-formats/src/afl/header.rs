//! AFL header parsing and building

use crate::MAX_ENTRIES;
use crate::afl::error::{AflError, Result};
use binrw::{BinRead, BinWrite};

/// Magic signature at the start of every AFL file
pub const AFL_MAGIC: [u8; 4] = *b"AFL\0";

/// Size of [`AflHeader`] in bytes
pub const AFL_HEADER_SIZE: usize = 0x10;

/// AFL file header
///
/// The two unknown fields are carried through unchanged so that a parsed
/// file rebuilds byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct AflHeader {
    /// Magic signature, always "AFL\0"
    pub magic: [u8; 4],

    /// Unknown; 1 in every file seen so far
    pub unknown1: u32,

    /// Unknown; -1 in every file seen so far
    pub unknown2: i32,

    /// Number of names following the header
    pub name_count: u32,
}

impl AflHeader {
    /// Create a header for `name_count` names
    pub const fn new(name_count: u32) -> Self {
        Self {
            magic: AFL_MAGIC,
            unknown1: 1,
            unknown2: -1,
            name_count,
        }
    }

    /// Validate the header fields
    pub fn validate(&self) -> Result<()> {
        if self.magic != AFL_MAGIC {
            return Err(AflError::InvalidMagic(self.magic));
        }

        if self.name_count as usize > MAX_ENTRIES {
            return Err(AflError::TooManyNames {
                count: self.name_count as usize,
                max: MAX_ENTRIES,
            });
        }

        Ok(())
    }
}
