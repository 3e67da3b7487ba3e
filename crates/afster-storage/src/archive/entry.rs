//! In-memory entry state

use crate::{Result, StorageError};
use afster_formats::afs::MetadataRecord;
use afster_formats::{EntryName, Timestamp};

/// Where a name or timestamp change is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NameTarget {
    /// Change what this handle reports; the metadata table is left alone
    #[default]
    OverlayOnly,
    /// Also write the change into the metadata table on the next save
    PersistToHeader,
}

/// Metadata of one entry as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Payload size in bytes
    pub size: u32,
    /// Entry name
    pub entry_name: String,
    /// Last-modified time, if one is recorded
    pub last_modified: Option<Timestamp>,
}

/// One row of [`Archive::entries`](crate::Archive::entries)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    /// Entry ID
    pub id: usize,
    /// Entry name
    pub name: String,
    /// Byte offset of the payload
    pub offset: u32,
    /// Payload size
    pub size: u32,
    /// Bytes the entry may occupy in place
    pub reserved: u32,
    /// Last-modified time, if one is recorded
    pub last_modified: Option<Timestamp>,
}

/// Entry as tracked by an open archive
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub offset: u32,
    pub size: u32,
    pub reserved: u32,
    /// Name reported to callers
    pub name: EntryName,
    /// Timestamp reported to callers
    pub last_modified: Option<Timestamp>,
    /// Metadata record as it will be written on save
    pub record: MetadataRecord,
    /// Replacement payload waiting for save
    pub staged: Option<Vec<u8>>,
}

impl Entry {
    pub(crate) fn from_record(
        offset: u32,
        size: u32,
        reserved: u32,
        record: MetadataRecord,
    ) -> Self {
        Self {
            offset,
            size,
            reserved,
            name: record.name,
            last_modified: record.last_modified.into_option(),
            record,
            staged: None,
        }
    }
}

/// Integer types accepted as entry IDs
///
/// Conversions check the ID against the entry count, so a negative ID coming
/// from a signed facade fails the same way as one past the end.
pub trait EntryIndex: Copy {
    /// Convert to a position in `[0, count)`
    fn resolve(self, count: usize) -> Result<usize>;

    /// The ID as a signed value, for error reports
    fn as_i64(self) -> i64;
}

fn invalid(id: i64, count: usize) -> StorageError {
    StorageError::InvalidId { id, count }
}

impl EntryIndex for usize {
    fn resolve(self, count: usize) -> Result<usize> {
        if self < count {
            Ok(self)
        } else {
            Err(invalid(self.as_i64(), count))
        }
    }

    fn as_i64(self) -> i64 {
        i64::try_from(self).unwrap_or(i64::MAX)
    }
}

impl EntryIndex for u32 {
    fn resolve(self, count: usize) -> Result<usize> {
        (self as usize).resolve(count)
    }

    fn as_i64(self) -> i64 {
        i64::from(self)
    }
}

impl EntryIndex for i64 {
    fn resolve(self, count: usize) -> Result<usize> {
        usize::try_from(self)
            .ok()
            .filter(|&id| id < count)
            .ok_or_else(|| invalid(self, count))
    }

    fn as_i64(self) -> i64 {
        self
    }
}

impl EntryIndex for i32 {
    fn resolve(self, count: usize) -> Result<usize> {
        i64::from(self).resolve(count)
    }

    fn as_i64(self) -> i64 {
        i64::from(self)
    }
}
