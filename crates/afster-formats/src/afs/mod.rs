//! AFS archive format support
//!
//! An AFS file packs many variable-size entries behind a fixed-layout index.
//! Entries are addressed by their position in the index (entry ID, 0-based).
//!
//! # AFS Structure
//!
//! | Offset      | Size  | Field |
//! |-------------|-------|-------|
//! | 0x00        | 4     | Magic `"AFS\0"` |
//! | 0x04        | 4     | Entry count `n` |
//! | 0x08        | 8 * n | `n` x `{ offset, size }` |
//! | 0x08 + 8n   | 8     | Metadata table `{ offset, size }`, `(0, 0)` when absent |
//!
//! Payloads follow the index, each starting on a slot boundary (2048 bytes
//! by default). The metadata table stores one 0x30-byte [`MetadataRecord`]
//! per entry.
//!
//! Reserved space is not part of the format. [`derive_reserved`] recovers it
//! from the order of the regions in the file: an entry owns every byte from
//! its offset up to the start of the next region (or end of file).
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use afster_formats::afs::{AfsIndex, MetadataTable};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("ADX_E.AFS")?;
//! let index = AfsIndex::parse(&data)?;
//! let reserved = index.derive_reserved(data.len() as u64)?;
//!
//! if index.has_metadata() {
//!     let start = index.metadata.offset as usize;
//!     let table = MetadataTable::parse(&data[start..], index.entry_count())?;
//!     for (id, (info, record)) in index.entries.iter().zip(&table.records).enumerate() {
//!         println!("{id}: {} at {:#x}, {} of {} bytes", record.name, info.offset, info.size, reserved[id]);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod header;
pub mod index;
pub mod layout;
pub mod metadata;

pub use error::{AfsError, Result};
pub use header::{AFS_MAGIC, AfsHeader, ENTRY_INFO_SIZE, EntryInfo, HEADER_SIZE};
pub use index::{AfsIndex, encode_entry_table, parse_entry_table};
pub use layout::{DEFAULT_SLOT_ALIGNMENT, Region, align_up, derive_reserved};
pub use metadata::{METADATA_RECORD_SIZE, MetadataRecord, MetadataTable};
