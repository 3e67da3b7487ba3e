//! Error types for AFL parsing and building

use crate::NameError;
use thiserror::Error;

/// Errors that can occur when parsing or building AFL files
#[derive(Error, Debug)]
pub enum AflError {
    /// Invalid magic signature detected
    #[error("Invalid AFL magic: expected 'AFL\\0', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Data is too short for the declared name count
    #[error("Truncated data: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Expected minimum size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Declared name count exceeds the format limit
    #[error("Too many names: {count} (maximum {max})")]
    TooManyNames {
        /// Declared count
        count: usize,
        /// Format limit
        max: usize,
    },

    /// Number of names differs from the header count
    #[error("Name count mismatch: header says {expected}, found {actual}")]
    NameCountMismatch {
        /// Count from the header
        expected: u32,
        /// Actual number of names
        actual: usize,
    },

    /// Label list and archive disagree on the number of entries
    #[error("Count mismatch: label list has {labels} names, archive has {entries} entries")]
    CountMismatch {
        /// Names in the label list
        labels: usize,
        /// Entries in the archive
        entries: usize,
    },

    /// Name index out of range
    #[error("Name index {index} out of range (count {count})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of names
        count: usize,
    },

    /// Name does not fit in its buffer
    #[error("Invalid name: {0}")]
    Name(#[from] NameError),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRw(String),

    /// IO error during parsing or building
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<binrw::Error> for AflError {
    fn from(e: binrw::Error) -> Self {
        Self::BinRw(e.to_string())
    }
}

/// Result type alias for AFL operations
pub type Result<T> = std::result::Result<T, AflError>;
