//! Error types for AFS parsing and building

use crate::afs::layout::Region;
use thiserror::Error;

/// Errors that can occur when parsing or building AFS structures
#[derive(Error, Debug)]
pub enum AfsError {
    /// Invalid magic signature detected
    #[error("Invalid AFS magic: expected 'AFS\\0', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Data is too short for the expected structure
    #[error("Truncated data: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Expected minimum size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Declared entry count exceeds the format limit
    #[error("Too many entries: {count} (maximum {max})")]
    TooManyEntries {
        /// Declared count
        count: usize,
        /// Format limit
        max: usize,
    },

    /// Number of table rows differs from the header count
    #[error("Entry count mismatch: header says {expected}, found {actual}")]
    EntryCountMismatch {
        /// Count from the header
        expected: u32,
        /// Actual number of rows
        actual: usize,
    },

    /// A region extends past the end of the file
    #[error("{region} [{offset:#x}, +{size:#x}) lies outside the file ({file_len:#x} bytes)")]
    RegionOutOfBounds {
        /// Offending region
        region: Region,
        /// Region start
        offset: u64,
        /// Region length
        size: u64,
        /// File length
        file_len: u64,
    },

    /// Two regions share bytes
    #[error("{first} overlaps {second}")]
    Overlap {
        /// Region that starts first
        first: Region,
        /// Region that starts inside `first`
        second: Region,
    },

    /// Metadata table cannot hold one record per entry
    #[error("Metadata table too small: need {expected} bytes, table has {actual}")]
    MetadataTooSmall {
        /// Bytes needed for `entry_count` records
        expected: usize,
        /// Size recorded in the index
        actual: u32,
    },

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRw(String),

    /// IO error during parsing or building
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<binrw::Error> for AfsError {
    fn from(e: binrw::Error) -> Self {
        Self::BinRw(e.to_string())
    }
}

/// Result type alias for AFS operations
pub type Result<T> = std::result::Result<T, AfsError>;
