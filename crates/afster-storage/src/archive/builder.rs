//! Writing complete archives in one pass

use super::extract::output_name;
use super::{Archive, check_entry_count, to_offset};
use crate::config::StorageConfig;
use crate::labels::LabelStore;
use crate::Result;
use afster_formats::afs::{
    AfsIndex, DEFAULT_SLOT_ALIGNMENT, EntryInfo, MetadataRecord, MetadataTable, align_up,
};
use afster_formats::{EntryName, Timestamp};
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Builder for a fresh archive with a canonical layout
///
/// Entries are written in the order they are added, each starting on a slot
/// boundary, followed by a metadata table holding every name and timestamp.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    alignment: u32,
    entries: Vec<PendingEntry>,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    name: EntryName,
    last_modified: Option<Timestamp>,
    data: Vec<u8>,
    /// Slot size to keep even if the payload is smaller
    min_reserved: u32,
}

/// Offsets computed for a builder's entries
struct Layout {
    index: AfsIndex,
    reserved: Vec<u64>,
    data_start: u64,
    file_end: u64,
}

impl ArchiveBuilder {
    /// Empty builder with the default slot alignment
    pub fn new() -> Self {
        Self {
            alignment: DEFAULT_SLOT_ALIGNMENT,
            entries: Vec::new(),
        }
    }

    /// Set the slot alignment
    #[must_use]
    pub fn with_alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment;
        self
    }

    /// Append an entry
    pub fn add_entry(
        self,
        name: &str,
        data: Vec<u8>,
        last_modified: Option<Timestamp>,
    ) -> Result<Self> {
        let name = EntryName::new(name)?;
        Ok(self.push(name, data, last_modified, 0))
    }

    fn push(
        mut self,
        name: EntryName,
        data: Vec<u8>,
        last_modified: Option<Timestamp>,
        min_reserved: u32,
    ) -> Self {
        self.entries.push(PendingEntry {
            name,
            last_modified,
            data,
            min_reserved,
        });
        self
    }

    /// Builder holding every entry of `source` as it currently reads
    ///
    /// Staged replacements and overlay names are included. Each entry keeps
    /// at least the reserved space it has in `source`.
    pub fn from_archive(source: &Archive) -> Result<Self> {
        let mut builder = Self::new().with_alignment(source.config.slot_alignment);
        for (id, entry) in source.entries.iter().enumerate() {
            let data = source.read_payload(id)?;
            builder = builder.push(entry.name, data, entry.last_modified, entry.reserved);
        }
        Ok(builder)
    }

    /// Builder for the files in `dir`, ordered and named by `labels`
    ///
    /// Label `i` becomes entry `i`; its payload is the file of the same name
    /// in `dir` and its timestamp is that file's modification time. Blank
    /// labels look for `blank_<i>`. A label with no matching file becomes an
    /// empty entry.
    pub fn from_directory<P: AsRef<Path>>(dir: P, labels: &LabelStore) -> Result<Self> {
        let dir = dir.as_ref();
        let mut builder = Self::new();
        let mut missing = 0usize;

        for (id, name) in labels.raw_names().iter().enumerate() {
            let path = dir.join(output_name(id, name));
            if path.is_file() {
                let data = std::fs::read(&path)?;
                let modified = std::fs::metadata(&path)?.modified().ok().map(local_timestamp);
                builder = builder.push(*name, data, modified, 0);
            } else {
                debug!("No file for label {id} at {}", path.display());
                missing += 1;
                builder = builder.push(*name, Vec::new(), None, 0);
            }
        }

        if missing > 0 {
            warn!(
                "{missing} of {} labels have no file in {}",
                labels.entry_count(),
                dir.display()
            );
        }
        Ok(builder)
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn layout(&self) -> Result<Layout> {
        check_entry_count(self.entries.len())?;
        StorageConfig::new()
            .with_slot_alignment(self.alignment)
            .validate()?;

        let alignment = u64::from(self.alignment);
        let count = self.entries.len();
        let data_start = align_up(AfsIndex::encoded_len_for(count) as u64, alignment);

        let mut cursor = data_start;
        let mut rows = Vec::with_capacity(count);
        let mut reserved = Vec::with_capacity(count);
        for entry in &self.entries {
            let len = entry.data.len() as u64;
            let slot = align_up(len.max(u64::from(entry.min_reserved)), alignment);
            rows.push(EntryInfo::new(to_offset(cursor)?, to_offset(len)?));
            reserved.push(slot);
            cursor += slot;
        }

        let (metadata, file_end) = if count == 0 {
            (EntryInfo::default(), cursor)
        } else {
            let table_len = MetadataTable::encoded_len_for(count) as u64;
            (
                EntryInfo::new(to_offset(cursor)?, to_offset(table_len)?),
                cursor + align_up(table_len, alignment),
            )
        };

        Ok(Layout {
            index: AfsIndex::new(rows, metadata),
            reserved,
            data_start,
            file_end,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let layout = self.layout()?;

        let index = layout.index.build()?;
        writer.write_all(&index)?;
        pad(writer, layout.data_start - index.len() as u64)?;

        for (entry, slot) in self.entries.iter().zip(&layout.reserved) {
            writer.write_all(&entry.data)?;
            pad(writer, slot - entry.data.len() as u64)?;
        }

        if layout.index.has_metadata() {
            let table = MetadataTable {
                records: self
                    .entries
                    .iter()
                    .map(|e| MetadataRecord::new(e.name, e.last_modified, e.data.len() as u32))
                    .collect(),
            }
            .build()?;
            writer.write_all(&table)?;
            let table_start = u64::from(layout.index.metadata.offset);
            pad(writer, layout.file_end - table_start - table.len() as u64)?;
        }

        writer.flush()?;
        Ok(layout.file_end)
    }

    /// Encode the whole archive in memory
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Write the archive to `path`, replacing any existing file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let len = self.write_to(&mut writer)?;
        writer.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()?;

        info!(
            "Wrote {} ({} entries, {len} bytes)",
            path.display(),
            self.entries.len()
        );
        Ok(())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Local wall-clock time of a file timestamp
fn local_timestamp(time: SystemTime) -> Timestamp {
    Timestamp::from(DateTime::<Local>::from(time).naive_local())
}

fn pad<W: Write>(writer: &mut W, len: u64) -> io::Result<()> {
    io::copy(&mut io::repeat(0).take(len), writer)?;
    Ok(())
}
