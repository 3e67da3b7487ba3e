//! Generation-tagged handle tables
//!
//! Callers that cannot own Rust values (C facades, scripting bindings) refer
//! to archives and label stores through [`Handle`]s. A handle packs a slot
//! index with the slot's generation; releasing a handle bumps the generation,
//! so a stale copy fails with [`StorageError::UseAfterFree`] instead of
//! reaching whatever reuses the slot.
//!
//! Each value sits behind its own mutex. Operations on different handles run
//! in parallel; operations on one handle are serialized.

use crate::archive::{Archive, NameTarget};
use crate::config::StorageConfig;
use crate::labels::LabelStore;
use crate::{Result, StorageError};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Reference to a value stored in a [`HandleTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Pack into a single integer (generation in the high half)
    pub const fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpack a value produced by [`Handle::to_raw`]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<Mutex<T>>>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

/// Table of values addressed by generation-tagged handles
pub struct HandleTable<T> {
    inner: RwLock<Slots<T>>,
}

impl<T> HandleTable<T> {
    /// Empty table
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Store `value` and return its handle
    pub fn insert(&self, value: T) -> Handle {
        let cell = Arc::new(Mutex::new(value));
        let mut inner = self.inner.write();

        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.value = Some(cell);
            Handle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Slot {
                generation: 0,
                value: Some(cell),
            });
            Handle {
                index,
                generation: 0,
            }
        }
    }

    /// Store `value` and release it again when the guard drops
    pub fn guard(&self, value: T) -> HandleGuard<'_, T> {
        HandleGuard {
            table: self,
            handle: self.insert(value),
        }
    }

    fn cell(&self, handle: Handle) -> Result<Arc<Mutex<T>>> {
        self.inner
            .read()
            .slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.clone())
            .ok_or(StorageError::UseAfterFree(handle))
    }

    /// Run `f` with exclusive access to the value behind `handle`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UseAfterFree`] if the handle was released,
    /// otherwise whatever `f` returns.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let cell = self.cell(handle)?;
        let mut value = cell.lock();
        f(&mut value)
    }

    /// Invalidate `handle`
    ///
    /// Returns the value unless an operation on it is still running, in
    /// which case it is dropped when that operation finishes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UseAfterFree`] if the handle was already
    /// released.
    pub fn release(&self, handle: Handle) -> Result<Option<T>> {
        let cell = {
            let mut inner = self.inner.write();
            let slot = inner
                .slots
                .get_mut(handle.index as usize)
                .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
                .ok_or(StorageError::UseAfterFree(handle))?;
            let cell = slot.value.take();
            slot.generation = slot.generation.wrapping_add(1);
            inner.free.push(handle.index);
            cell
        };

        Ok(cell.and_then(|cell| Arc::try_unwrap(cell).ok().map(Mutex::into_inner)))
    }

    /// True if `handle` refers to a live value
    pub fn contains(&self, handle: Handle) -> bool {
        self.cell(handle).is_ok()
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.slots.len() - inner.free.len()
    }

    /// True if no value is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle that is released when dropped
pub struct HandleGuard<'a, T> {
    table: &'a HandleTable<T>,
    handle: Handle,
}

impl<T> HandleGuard<'_, T> {
    /// The guarded handle
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Run `f` on the guarded value
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        self.table.with(self.handle, f)
    }

    /// Keep the value alive past the guard
    pub fn into_handle(self) -> Handle {
        let handle = self.handle;
        std::mem::forget(self);
        handle
    }
}

impl<T> Drop for HandleGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.table.release(self.handle) {
            debug!("Guarded handle already released: {e}");
        }
    }
}

/// Handle tables for archives and label stores
pub struct Registry {
    config: StorageConfig,
    archives: HandleTable<Archive>,
    labels: HandleTable<LabelStore>,
}

impl Registry {
    /// Registry opening archives with the default configuration
    pub fn new() -> Self {
        Self::with_config(StorageConfig::default())
    }

    /// Registry opening archives with `config`
    pub fn with_config(config: StorageConfig) -> Self {
        Self {
            config,
            archives: HandleTable::new(),
            labels: HandleTable::new(),
        }
    }

    /// Process-wide registry
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Open an archive and return its handle
    pub fn open_archive<P: AsRef<Path>>(&self, path: P) -> Result<Handle> {
        let archive = Archive::open_with_config(path, self.config.clone())?;
        Ok(self.archives.insert(archive))
    }

    /// Create an empty archive and return its handle
    pub fn new_archive<P: AsRef<Path>>(&self, entry_count: usize, path: P) -> Result<Handle> {
        let archive = Archive::new_with_config(entry_count, path, self.config.clone())?;
        Ok(self.archives.insert(archive))
    }

    /// Write a compacted copy of `source` to `path` and return its handle
    pub fn create_archive<P: AsRef<Path>>(&self, source: Handle, path: P) -> Result<Handle> {
        let archive = self
            .archives
            .with(source, |source| Archive::create_from(source, path))?;
        Ok(self.archives.insert(archive))
    }

    /// Run `f` on an open archive
    pub fn with_archive<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut Archive) -> Result<R>,
    ) -> Result<R> {
        self.archives.with(handle, f)
    }

    /// Close an archive, discarding unsaved changes
    pub fn close_archive(&self, handle: Handle) -> Result<()> {
        if let Some(archive) = self.archives.release(handle)? {
            archive.close();
        }
        Ok(())
    }

    /// Open a label store and return its handle
    pub fn open_labels<P: AsRef<Path>>(&self, path: P) -> Result<Handle> {
        Ok(self.labels.insert(LabelStore::open(path)?))
    }

    /// Create a blank label store and return its handle
    pub fn new_labels<P: AsRef<Path>>(&self, count: usize, path: P) -> Result<Handle> {
        Ok(self.labels.insert(LabelStore::new(count, path)?))
    }

    /// Create a label store from an archive's names and return its handle
    pub fn create_labels<P: AsRef<Path>>(&self, archive: Handle, path: P) -> Result<Handle> {
        let store = self
            .archives
            .with(archive, |archive| LabelStore::from_archive(archive, path))?;
        Ok(self.labels.insert(store))
    }

    /// Run `f` on an open label store
    pub fn with_labels<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut LabelStore) -> Result<R>,
    ) -> Result<R> {
        self.labels.with(handle, f)
    }

    /// Close a label store, discarding unsaved changes
    pub fn close_labels(&self, handle: Handle) -> Result<()> {
        if let Some(store) = self.labels.release(handle)? {
            store.close();
        }
        Ok(())
    }

    /// Copy names from a label store into an archive
    ///
    /// See [`LabelStore::import_into`].
    pub fn import_labels(
        &self,
        labels: Handle,
        archive: Handle,
        target: NameTarget,
    ) -> Result<usize> {
        // Snapshot the names so only one value is locked at a time.
        let store = self.labels.with(labels, |store| Ok(store.clone()))?;
        self.archives
            .with(archive, |archive| store.import_into(archive, target))
    }

    /// Number of open archives
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    /// Number of open label stores
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
