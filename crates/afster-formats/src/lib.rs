//! File format parsers and builders for AFS archives and AFL label lists
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate provides symmetric (parser and builder) implementations for the
//! two file formats used by AFS-based game data:
//!
//! - **AFS**: an archive holding many variable-size binary entries, addressed
//!   by a fixed-layout offset/size table, with an optional metadata table
//!   carrying a 32-byte name and a last-modified timestamp per entry
//! - **AFL**: a companion label list storing one 32-byte name per entry ID
//!
//! The crate performs no file I/O. Callers hand in byte buffers and receive
//! byte buffers; the `afster-storage` crate owns files and handles.
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: Both parsing and building supported
//! - **Type Safety**: Names, timestamps and layout regions are distinct types
//! - **Round-Trip Guarantee**: parse(build(data)) == data, including the raw
//!   bytes of name buffers and unknown header fields
//! - **Little-Endian Only**: Every multi-byte field is little-endian

#![warn(missing_docs)]

/// AFS archive index, metadata table and slot layout
///
/// Key features:
/// - **Index Parsing**: Magic, entry count and the offset/size table
/// - **Metadata Table**: Fixed 0x30-byte records with name, timestamp, size
/// - **Slot Layout**: Derives each entry's reserved space from file order
/// - **Validation**: Rejects out-of-bounds and overlapping regions
///
/// See the [`afs`] module for layout details.
pub mod afs;
/// AFL label list format
///
/// See the [`afl`] module for layout details.
pub mod afl;
pub mod name;
pub mod timestamp;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use name::{EntryName, MAX_NAME_LEN, NAME_BUFFER_SIZE, NameError};
pub use timestamp::Timestamp;

/// Maximum number of entries an AFS or AFL may declare.
///
/// Label lists store their capacity in tooling as a 16-bit count, so both
/// formats are capped at the same value.
pub const MAX_ENTRIES: usize = 65_535;

/// Common format trait implemented by self-describing formats
pub trait AfsterFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
