//! Open AFS archives
//!
//! An [`Archive`] reads the index and metadata table when it is opened and
//! keeps them in memory. Payloads stay on disk (memory-mapped by default)
//! until they are extracted.
//!
//! All changes are staged: renames, metadata edits and replacement payloads
//! live in memory until [`Archive::save`] writes them back, or
//! [`Archive::save_as`] writes a patched copy elsewhere. Dropping or
//! [closing](Archive::close) an archive discards anything not yet saved.
//!
//! # Slots
//!
//! Every entry owns the bytes from its offset up to the next region in the
//! file (another entry, the metadata table, or end of file). That span is its
//! *reserved space*. A replacement that fits is written in place; a larger one
//! moves the entry to a fresh slot at the end of the file, aligned to
//! [`StorageConfig::slot_alignment`]. Moved entries leave their old slot
//! unused; the file is never shrunk.

mod builder;
mod entry;
mod extract;
mod replace;
mod source;

pub use builder::ArchiveBuilder;
pub use entry::{EntryIndex, EntryMetadata, EntrySummary, NameTarget};
pub use extract::ExtractReport;
pub use replace::DirectoryImport;

use crate::config::StorageConfig;
use crate::{Result, StorageError};
use afster_formats::afs::{
    AfsIndex, EntryInfo, HEADER_SIZE, MetadataRecord, MetadataTable, align_up,
};
use afster_formats::{EntryName, MAX_ENTRIES, Timestamp};
use entry::Entry;
use source::PayloadSource;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An open AFS archive
pub struct Archive {
    /// File this archive was opened from and saves to
    path: PathBuf,
    config: StorageConfig,
    /// Unmodified payloads are read from here
    source: PayloadSource,
    /// `path` holds a complete archive that saves patch in place
    on_disk: bool,
    entries: Vec<Entry>,
    /// Metadata table location; `size == 0` when the file has none
    metadata: EntryInfo,
    /// A persisted name or timestamp changed since the last save
    metadata_dirty: bool,
    /// Length of the file once every staged change is written
    file_end: u64,
}

/// Locations decided at save time
#[derive(Debug, Clone, Copy)]
struct SavePlan {
    metadata: EntryInfo,
    file_end: u64,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("metadata", &self.metadata)
            .field("file_end", &self.file_end)
            .field("on_disk", &self.on_disk)
            .finish_non_exhaustive()
    }
}

/// Convert a file position to a 32-bit on-disk offset
pub(crate) fn to_offset(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StorageError::ArchiveTooLarge { required: value })
}

/// Check a requested entry count against the format limit
pub(crate) fn check_entry_count(count: usize) -> Result<()> {
    if count > MAX_ENTRIES {
        return Err(StorageError::LimitExceeded {
            requested: count,
            max: MAX_ENTRIES,
        });
    }
    Ok(())
}

impl Archive {
    /// Open an existing archive with the default configuration
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file cannot be read and
    /// [`StorageError::MalformedFormat`] if the index or metadata table is
    /// invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, StorageConfig::default())
    }

    /// Open an existing archive
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let (source, file_len) = PayloadSource::open(path, config.enable_mmap)?;

        let prefix = source.read_range(0, (file_len as usize).min(HEADER_SIZE))?;
        let header = AfsIndex::parse_header(&prefix)?;
        let index_len = AfsIndex::encoded_len_for(header.entry_count as usize);
        let index_bytes = source.read_range(0, index_len.min(file_len as usize))?;
        let index = AfsIndex::parse(&index_bytes)?;
        let reserved = index.derive_reserved(file_len)?;

        let table = if index.has_metadata() {
            let bytes = source.read_range(
                u64::from(index.metadata.offset),
                index.metadata.size as usize,
            )?;
            MetadataTable::parse(&bytes, index.entry_count())?
        } else {
            MetadataTable::blank(index.entry_count())
        };

        let entries = index
            .entries
            .iter()
            .zip(reserved)
            .zip(table.records)
            .map(|((info, reserved), record)| {
                Entry::from_record(info.offset, info.size, reserved, record)
            })
            .collect::<Vec<_>>();

        info!(
            "Opened archive {} with {} entries (metadata table: {})",
            path.display(),
            entries.len(),
            if index.has_metadata() { "yes" } else { "no" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            source,
            on_disk: true,
            entries,
            metadata: index.metadata,
            metadata_dirty: false,
            file_end: file_len,
        })
    }

    /// Create an empty archive of `entry_count` blank entries
    ///
    /// Nothing is written until [`Archive::save`].
    pub fn new<P: AsRef<Path>>(entry_count: usize, path: P) -> Result<Self> {
        Self::new_with_config(entry_count, path, StorageConfig::default())
    }

    /// Create an empty archive of `entry_count` blank entries
    ///
    /// Every entry starts at the first aligned offset after the index with
    /// size and reserved space zero, followed by a metadata table of blank
    /// records.
    pub fn new_with_config<P: AsRef<Path>>(
        entry_count: usize,
        path: P,
        config: StorageConfig,
    ) -> Result<Self> {
        config.validate()?;
        check_entry_count(entry_count)?;

        let alignment = u64::from(config.slot_alignment);
        let data_start = align_up(AfsIndex::encoded_len_for(entry_count) as u64, alignment);
        let table_len = MetadataTable::encoded_len_for(entry_count) as u64;
        let offset = to_offset(data_start)?;

        let entries = (0..entry_count)
            .map(|_| Entry::from_record(offset, 0, 0, MetadataRecord::default()))
            .collect();
        let metadata = if entry_count == 0 {
            EntryInfo::default()
        } else {
            EntryInfo::new(offset, to_offset(table_len)?)
        };

        debug!(
            "New archive {} with {entry_count} entries",
            path.as_ref().display()
        );

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            config,
            source: PayloadSource::Detached,
            on_disk: false,
            entries,
            metadata,
            metadata_dirty: entry_count > 0,
            file_end: data_start + align_up(table_len, alignment),
        })
    }

    /// Write a compacted copy of `source` to `path` and open it
    ///
    /// Entries are laid out in ID order. Each keeps at least the reserved
    /// space it had in `source`, and the names and timestamps `source`
    /// reports are written to the new metadata table.
    pub fn create_from<P: AsRef<Path>>(source: &Self, path: P) -> Result<Self> {
        let path = path.as_ref();
        ArchiveBuilder::from_archive(source)?.write(path)?;
        info!(
            "Created {} from {} ({} entries)",
            path.display(),
            source.path.display(),
            source.entries.len()
        );
        Self::open_with_config(path, source.config.clone())
    }

    /// Path the archive saves to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Active configuration
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// True if the file carries (or will carry after save) a metadata table
    pub const fn has_metadata_table(&self) -> bool {
        self.metadata.size != 0 || self.metadata_dirty
    }

    /// True if a save would change the file
    pub fn has_unsaved_changes(&self) -> bool {
        self.metadata_dirty
            || self.entries.iter().any(|e| e.staged.is_some())
            || !self.on_disk
    }

    pub(crate) fn entry(&self, id: impl EntryIndex) -> Result<(usize, &Entry)> {
        let id = id.resolve(self.entries.len())?;
        Ok((id, &self.entries[id]))
    }

    fn entry_mut(&mut self, id: impl EntryIndex) -> Result<(usize, &mut Entry)> {
        let id = id.resolve(self.entries.len())?;
        Ok((id, &mut self.entries[id]))
    }

    /// Name of an entry
    pub fn name(&self, id: impl EntryIndex) -> Result<String> {
        let (_, entry) = self.entry(id)?;
        Ok(entry.name.as_str().into_owned())
    }

    /// Rename an entry
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if `name` is longer than 31 bytes
    /// or contains a NUL byte.
    pub fn rename(&mut self, id: impl EntryIndex, name: &str, target: NameTarget) -> Result<()> {
        let encoded = EntryName::new(name)?;
        let (id, _) = self.entry(id)?;
        self.set_name_raw(id, encoded, target);
        Ok(())
    }

    /// Rename an entry from an already-encoded buffer
    pub(crate) fn set_name_raw(&mut self, id: usize, name: EntryName, target: NameTarget) {
        let entry = &mut self.entries[id];
        entry.name = name;
        if target == NameTarget::PersistToHeader && entry.record.name != name {
            entry.record.name = name;
            self.metadata_dirty = true;
        }
    }

    /// Size, name and timestamp of an entry
    pub fn entry_metadata(&self, id: impl EntryIndex) -> Result<EntryMetadata> {
        let (_, entry) = self.entry(id)?;
        Ok(EntryMetadata {
            size: entry.size,
            entry_name: entry.name.as_str().into_owned(),
            last_modified: entry.last_modified,
        })
    }

    /// Set the name and timestamp of an entry
    ///
    /// The size is derived from the payload; `metadata.size` is ignored.
    pub fn set_entry_metadata(
        &mut self,
        id: impl EntryIndex,
        metadata: &EntryMetadata,
        target: NameTarget,
    ) -> Result<()> {
        let encoded = EntryName::new(&metadata.entry_name)?;
        let (id, entry) = self.entry_mut(id)?;
        if metadata.size != entry.size {
            debug!(
                "Ignoring size {} for entry {id}; payload is {} bytes",
                metadata.size, entry.size
            );
        }

        entry.last_modified = metadata.last_modified;
        let stamp = Timestamp::from_option(metadata.last_modified);
        let persist_stamp =
            target == NameTarget::PersistToHeader && entry.record.last_modified != stamp;
        if persist_stamp {
            entry.record.last_modified = stamp;
        }
        self.metadata_dirty |= persist_stamp;
        self.set_name_raw(id, encoded, target);
        Ok(())
    }

    /// Last-modified time of an entry, if one is recorded
    pub fn last_modified(&self, id: impl EntryIndex) -> Result<Option<Timestamp>> {
        Ok(self.entry(id)?.1.last_modified)
    }

    /// Byte offset of an entry's payload
    pub fn entry_offset(&self, id: impl EntryIndex) -> Result<u32> {
        Ok(self.entry(id)?.1.offset)
    }

    /// Payload size of an entry
    pub fn entry_size(&self, id: impl EntryIndex) -> Result<u32> {
        Ok(self.entry(id)?.1.size)
    }

    /// Bytes an entry may occupy without moving
    pub fn entry_reserved_space(&self, id: impl EntryIndex) -> Result<u32> {
        Ok(self.entry(id)?.1.reserved)
    }

    /// Summary of every entry in ID order
    pub fn entries(&self) -> Vec<EntrySummary> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| EntrySummary {
                id,
                name: entry.name.as_str().into_owned(),
                offset: entry.offset,
                size: entry.size,
                reserved: entry.reserved,
                last_modified: entry.last_modified,
            })
            .collect()
    }

    /// Name buffers as reported, in ID order
    pub(crate) fn raw_names(&self) -> impl Iterator<Item = EntryName> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }

    /// Current payload of entry `id`, staged or on disk
    pub(crate) fn read_payload(&self, id: usize) -> Result<Vec<u8>> {
        let entry = &self.entries[id];
        match &entry.staged {
            Some(data) => Ok(data.clone()),
            None => self
                .source
                .read_range(u64::from(entry.offset), entry.size as usize),
        }
    }

    /// Write every staged change back to [`Archive::path`]
    ///
    /// Only the index, the metadata table and replaced payloads are
    /// rewritten; saving an archive with no changes leaves the file byte for
    /// byte as it was.
    pub fn save(&mut self) -> Result<()> {
        let plan = self.plan_save()?;
        let fresh = !self.on_disk;

        // Unmap before writing the same file through another handle.
        self.source = PayloadSource::Detached;
        let written = self.write_into(&self.path, &plan, fresh);
        if written.is_ok() {
            self.on_disk = true;
        }

        match PayloadSource::open(&self.path, self.config.enable_mmap) {
            Ok((source, _)) => self.source = source,
            Err(e) if written.is_ok() => return Err(e),
            Err(e) => warn!("Failed to reopen {} after save: {e}", self.path.display()),
        }
        written?;

        let staged = self.entries.iter().filter(|e| e.staged.is_some()).count();
        for entry in &mut self.entries {
            entry.staged = None;
        }
        self.metadata = plan.metadata;
        self.file_end = plan.file_end;
        self.metadata_dirty = false;

        info!(
            "Saved {} ({staged} payloads written, {} bytes)",
            self.path.display(),
            plan.file_end
        );
        Ok(())
    }

    /// Write the archive with every staged change to `path`
    ///
    /// The archive keeps its own path and its staged changes; a later
    /// [`Archive::save`] still writes them to the original file. Saving to
    /// the archive's own path is the same as [`Archive::save`].
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if same_file(path, &self.path) {
            return self.save();
        }

        let plan = self.plan_save()?;
        let fresh = !self.on_disk;
        if !fresh {
            std::fs::copy(&self.path, path)?;
        }
        self.write_into(path, &plan, fresh)?;

        info!("Saved copy of {} to {}", self.path.display(), path.display());
        Ok(())
    }

    /// Release the archive, discarding unsaved changes
    pub fn close(self) {
        let pending = self.entries.iter().filter(|e| e.staged.is_some()).count();
        if pending > 0 || self.metadata_dirty {
            warn!(
                "Closing {} with unsaved changes ({pending} staged payloads)",
                self.path.display()
            );
        } else {
            debug!("Closed {}", self.path.display());
        }
    }

    fn alignment(&self) -> u64 {
        u64::from(self.config.slot_alignment)
    }

    /// Decide where the metadata table goes and how long the file will be
    fn plan_save(&self) -> Result<SavePlan> {
        let mut plan = SavePlan {
            metadata: self.metadata,
            file_end: self.file_end,
        };

        if self.metadata.size == 0 && self.metadata_dirty && !self.entries.is_empty() {
            let offset = align_up(self.file_end, self.alignment());
            let len = MetadataTable::encoded_len_for(self.entries.len()) as u64;
            plan.metadata = EntryInfo::new(to_offset(offset)?, to_offset(len)?);
            plan.file_end = offset + align_up(len, self.alignment());
            debug!(
                "Allocating metadata table for {} at {offset:#x}",
                self.path.display()
            );
        }

        Ok(plan)
    }

    fn write_into(&self, path: &Path, plan: &SavePlan, fresh: bool) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(fresh)
            .open(path)?;
        self.write_changes(&mut file, plan)
    }

    fn write_changes(&self, file: &mut File, plan: &SavePlan) -> Result<()> {
        for (id, entry) in self.entries.iter().enumerate() {
            let Some(data) = &entry.staged else {
                continue;
            };
            debug!(
                "Writing entry {id}: {} bytes at {:#x}",
                data.len(),
                entry.offset
            );
            file.seek(SeekFrom::Start(u64::from(entry.offset)))?;
            file.write_all(data)?;

            if self.config.zero_fill_slack {
                let slack = u64::from(entry.reserved).saturating_sub(data.len() as u64);
                io::copy(&mut io::repeat(0).take(slack), file)?;
            }
        }

        if plan.metadata.size != 0 {
            let table = MetadataTable {
                records: self.entries.iter().map(|e| e.record).collect(),
            };
            file.seek(SeekFrom::Start(u64::from(plan.metadata.offset)))?;
            file.write_all(&table.build()?)?;
        }

        let index = AfsIndex::new(
            self.entries
                .iter()
                .map(|e| EntryInfo::new(e.offset, e.size))
                .collect(),
            plan.metadata,
        );
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&index.build()?)?;

        if file.metadata()?.len() < plan.file_end {
            file.set_len(plan.file_end)?;
        }
        file.sync_all()?;
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
