//! Open AFL label stores
//!
//! A label store is a list of entry names kept next to an archive. Like an
//! archive it is staged: [`LabelStore::new`], [`LabelStore::from_archive`]
//! and [`LabelStore::rename`] change memory only, and
//! [`LabelStore::save`] writes the whole file.

use crate::archive::{Archive, EntryIndex, NameTarget, check_entry_count};
use crate::{Result, StorageError};
use afster_formats::EntryName;
use afster_formats::afl::AflFile;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An open AFL label store
#[derive(Debug, Clone)]
pub struct LabelStore {
    path: PathBuf,
    file: AflFile,
}

impl LabelStore {
    /// Read a label store from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let file = AflFile::parse(&data)?;
        info!(
            "Opened label store {} with {} names",
            path.display(),
            file.name_count()
        );
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Label store of `count` blank names, saved to `path`
    pub fn new<P: AsRef<Path>>(count: usize, path: P) -> Result<Self> {
        check_entry_count(count)?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file: AflFile::new(count)?,
        })
    }

    /// Label store holding the names `archive` currently reports
    pub fn from_archive<P: AsRef<Path>>(archive: &Archive, path: P) -> Result<Self> {
        let names = archive.raw_names().collect::<Vec<_>>();
        debug!(
            "Label store for {} ({} names)",
            archive.path().display(),
            names.len()
        );
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file: AflFile::from_names(names)?,
        })
    }

    /// Path the store saves to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of names
    pub fn entry_count(&self) -> usize {
        self.file.name_count()
    }

    /// Name at `id`
    pub fn name(&self, id: impl EntryIndex) -> Result<String> {
        let id = id.resolve(self.entry_count())?;
        Ok(self.file.name(id)?.as_str().into_owned())
    }

    /// Replace the name at `id`
    pub fn rename(&mut self, id: impl EntryIndex, name: &str) -> Result<()> {
        let id = id.resolve(self.entry_count())?;
        self.file.set_name(id, name)?;
        Ok(())
    }

    pub(crate) fn raw_names(&self) -> &[EntryName] {
        &self.file.names
    }

    /// Write the store to [`LabelStore::path`]
    pub fn save(&self) -> Result<()> {
        self.write_to(&self.path)
    }

    /// Write the store to `path` without changing where it saves
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_to(path.as_ref())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.file.build()?)?;
        info!(
            "Saved label store {} ({} names)",
            path.display(),
            self.entry_count()
        );
        Ok(())
    }

    /// Copy names into `archive`, label `i` to entry `i`
    ///
    /// Names are copied for every ID both sides have. Returns the number
    /// copied.
    ///
    /// # Errors
    ///
    /// If the counts differ the overlapping names are still copied, then
    /// [`StorageError::CountMismatch`] reports both counts and how many names
    /// went in.
    pub fn import_into(&self, archive: &mut Archive, target: NameTarget) -> Result<usize> {
        let labels = self.entry_count();
        let entries = archive.entry_count();
        let imported = labels.min(entries);

        for (id, name) in self.file.names.iter().take(imported).enumerate() {
            archive.set_name_raw(id, *name, target);
        }

        if self.file.check_count(entries).is_err() {
            warn!(
                "Label store {} has {labels} names for {entries} entries; imported {imported}",
                self.path.display()
            );
            return Err(StorageError::CountMismatch {
                labels,
                entries,
                imported,
            });
        }

        debug!("Imported {imported} names into {}", archive.path().display());
        Ok(imported)
    }

    /// Release the store, discarding unsaved changes
    pub fn close(self) {
        debug!("Closed label store {}", self.path.display());
    }
}
