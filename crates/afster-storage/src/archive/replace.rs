//! Replacing entry payloads

use super::{Archive, EntryIndex, to_offset};
use crate::{Result, StorageError};
use afster_formats::afs::align_up;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of [`Archive::import_directory`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryImport {
    /// Entries replaced, with the file each one came from
    pub replaced: Vec<(usize, PathBuf)>,
    /// Files in the directory that match no entry name
    pub unmatched: Vec<PathBuf>,
}

impl Archive {
    /// Stage a new payload for an entry
    ///
    /// A payload no larger than the entry's reserved space is written in
    /// place on save. A larger one moves the entry to a new slot at the
    /// aligned end of the file, with reserved space rounded up to the slot
    /// alignment. The recorded file size follows the payload either way.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidId`] for an unknown entry and
    /// [`StorageError::ArchiveTooLarge`] if the move would need an offset
    /// past 4 GiB.
    pub fn replace_entry(&mut self, id: impl EntryIndex, data: &[u8]) -> Result<()> {
        let id = id.resolve(self.entries.len())?;
        let len = to_offset(data.len() as u64)?;
        let alignment = self.alignment();

        let entry = &self.entries[id];
        let (offset, reserved) = if len <= entry.reserved {
            (entry.offset, entry.reserved)
        } else {
            let start = align_up(self.file_end, alignment);
            let reserved = align_up(u64::from(len), alignment);
            let offset = to_offset(start)?;
            let reserved32 = to_offset(reserved)?;
            debug!(
                "Moving entry {id} from {:#x}+{:#x} to {start:#x}+{reserved:#x}",
                entry.offset, entry.reserved
            );
            self.file_end = start + reserved;
            (offset, reserved32)
        };

        let entry = &mut self.entries[id];
        entry.offset = offset;
        entry.reserved = reserved;
        entry.size = len;
        entry.record.file_size = len;
        entry.staged = Some(data.to_vec());
        Ok(())
    }

    /// Replace several entries, one payload per ID
    ///
    /// Items are applied in order. If one fails, the ones before it stay
    /// applied and the error reports how far the batch got.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LengthMismatch`] before touching anything if
    /// the slices differ in length, and [`StorageError::PartialFailure`] if an
    /// item fails.
    pub fn replace_entries<I, D>(&mut self, ids: &[I], payloads: &[D]) -> Result<usize>
    where
        I: EntryIndex,
        D: AsRef<[u8]>,
    {
        check_lengths(ids.len(), payloads.len())?;
        self.apply_batch(ids, |archive, id, index| {
            archive.replace_entry(id, payloads[index].as_ref())
        })
    }

    /// Replace several entries with the contents of files, one path per ID
    ///
    /// Same ordering and failure rules as [`Archive::replace_entries`]; a file
    /// that cannot be read fails its item.
    pub fn replace_entries_from_files<I, P>(&mut self, ids: &[I], paths: &[P]) -> Result<usize>
    where
        I: EntryIndex,
        P: AsRef<Path>,
    {
        check_lengths(ids.len(), paths.len())?;
        self.apply_batch(ids, |archive, id, index| {
            let data = std::fs::read(paths[index].as_ref())?;
            archive.replace_entry(id, &data)
        })
    }

    fn apply_batch<I, F>(&mut self, ids: &[I], mut apply: F) -> Result<usize>
    where
        I: EntryIndex,
        F: FnMut(&mut Self, I, usize) -> Result<()>,
    {
        for (index, &id) in ids.iter().enumerate() {
            if let Err(e) = apply(self, id, index) {
                let failed_id = id.as_i64();
                warn!("Batch replace stopped at entry {failed_id} after {index} items: {e}");
                return Err(StorageError::PartialFailure {
                    applied: index,
                    failed_id,
                    source: Box::new(e),
                });
            }
        }
        debug!("Replaced {} entries", ids.len());
        Ok(ids.len())
    }

    /// Replace every entry that has a same-named file in `dir`
    ///
    /// Names are matched exactly against the names this archive reports. When
    /// several entries share a name, the first one is replaced.
    pub fn import_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<DirectoryImport> {
        let dir = dir.as_ref();
        let mut files = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        files.retain(|path| path.is_file());
        files.sort();

        let mut ids = Vec::new();
        let mut import = DirectoryImport::default();
        for path in files {
            let matched = path.file_name().and_then(|name| {
                let name = name.to_string_lossy();
                self.entries
                    .iter()
                    .position(|entry| !entry.name.is_blank() && entry.name.as_str() == name)
            });
            match matched {
                Some(id) => {
                    ids.push(id);
                    import.replaced.push((id, path));
                }
                None => {
                    debug!("No entry named after {}", path.display());
                    import.unmatched.push(path);
                }
            }
        }

        let paths = import
            .replaced
            .iter()
            .map(|(_, path)| path.as_path())
            .collect::<Vec<_>>();
        self.replace_entries_from_files(&ids, &paths)?;

        info!(
            "Imported {} files from {} ({} unmatched)",
            import.replaced.len(),
            dir.display(),
            import.unmatched.len()
        );
        Ok(import)
    }
}

fn check_lengths(ids: usize, sources: usize) -> Result<()> {
    if ids == sources {
        Ok(())
    } else {
        Err(StorageError::LengthMismatch { ids, sources })
    }
}
