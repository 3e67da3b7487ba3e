//! Copying entries out of an archive

use super::{Archive, EntryIndex};
use crate::{Result, StorageError};
use afster_formats::EntryName;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of [`Archive::extract_all`]
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Entries written, with the file each one went to
    pub written: Vec<(usize, PathBuf)>,
    /// Entries that could not be written
    pub failed: Vec<(usize, StorageError)>,
}

impl ExtractReport {
    /// True if every entry was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// IDs of the entries that failed
    pub fn failed_ids(&self) -> Vec<usize> {
        self.failed.iter().map(|(id, _)| *id).collect()
    }
}

/// File name an entry extracts to
///
/// Directory separators are replaced so the result is a single path
/// component; blank names become `blank_<id>`.
pub(crate) fn output_name(id: usize, name: &EntryName) -> String {
    let text: String = name
        .as_str()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let text = text.trim();

    if text.is_empty() || text == "." || text == ".." {
        format!("blank_{id}")
    } else {
        text.to_string()
    }
}

/// `name(n).ext` for the `n`th duplicate of `name`
fn numbered(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}({n}){}", &name[..dot], &name[dot..]),
        _ => format!("{name}({n})"),
    }
}

/// True if anything, including a dangling link, already sits at `path`
fn is_taken(path: &Path) -> io::Result<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create `path` and write `data` to it
///
/// Fails with `AlreadyExists` rather than following a link or touching an
/// existing file.
fn write_new(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)
}

impl Archive {
    /// Copy of an entry's payload
    ///
    /// Reflects a staged replacement if there is one.
    pub fn extract_to_buffer(&self, id: impl EntryIndex) -> Result<Vec<u8>> {
        let (id, _) = self.entry(id)?;
        self.read_payload(id)
    }

    /// Write an entry's payload into `dir`, named after the entry
    ///
    /// Creates `dir` if needed and replaces an existing regular file of the
    /// same name. Anything else at that path (a link, a directory) is left
    /// alone and the call fails. Returns the path written.
    pub fn extract_to_file<P: AsRef<Path>>(&self, id: impl EntryIndex, dir: P) -> Result<PathBuf> {
        let (id, entry) = self.entry(id)?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(output_name(id, &entry.name));
        let data = self.read_payload(id)?;
        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_file() => std::fs::remove_file(&path)?,
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a regular file", path.display()),
                )
                .into());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        write_new(&path, &data)?;
        debug!("Extracted entry {id} to {}", path.display());
        Ok(path)
    }

    /// Write every entry into `dir`
    ///
    /// Entries whose names collide, with each other or with files already in
    /// `dir`, are written as `name(1).ext`, `name(2).ext` and so on. A
    /// failing entry is recorded in the report and extraction carries on.
    ///
    /// # Errors
    ///
    /// Fails only if `dir` cannot be created.
    pub fn extract_all<P: AsRef<Path>>(&self, dir: P) -> Result<ExtractReport> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut report = ExtractReport::default();
        let mut used = HashSet::new();

        for (id, entry) in self.entries.iter().enumerate() {
            let base = output_name(id, &entry.name);
            let result = self.read_payload(id).and_then(|data| {
                for n in 0.. {
                    let file_name = if n == 0 {
                        base.clone()
                    } else {
                        numbered(&base, n)
                    };
                    let path = dir.join(&file_name);
                    if used.contains(&file_name) || is_taken(&path)? {
                        continue;
                    }
                    used.insert(file_name);

                    match write_new(&path, &data) {
                        Ok(()) => return Ok(path),
                        // Created by someone else since the check
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                        Err(e) => return Err(StorageError::from(e)),
                    }
                }
                Err(io::Error::other(format!("no free file name for {base}")).into())
            });

            match result {
                Ok(path) => report.written.push((id, path)),
                Err(e) => {
                    warn!("Failed to extract entry {id} into {}: {e}", dir.display());
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            "Extracted {} of {} entries to {}",
            report.written.len(),
            self.entries.len(),
            dir.display()
        );
        Ok(report)
    }
}
