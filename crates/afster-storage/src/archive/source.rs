//! Read access to the backing file of an open archive

use crate::Result;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Where unmodified payload bytes are read from
pub(crate) enum PayloadSource {
    /// Nothing open: a fresh archive, or a save that could not reopen its file
    Detached,
    /// Memory-mapped file
    Mapped(Mmap),
    /// Plain file handle, read with seek + read
    File(File),
}

impl PayloadSource {
    /// Open `path` for reading and return the source with the file length
    ///
    /// Empty files are never mapped; mapping zero bytes fails on some
    /// platforms.
    pub(crate) fn open(path: &Path, enable_mmap: bool) -> Result<(Self, u64)> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        if enable_mmap && len > 0 {
            // The archive is single-owner; nothing else in this process
            // writes the file while the map is alive.
            #[allow(unsafe_code)]
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            debug!("Mapped {} ({len} bytes)", path.display());
            Ok((Self::Mapped(mmap), len))
        } else {
            Ok((Self::File(file), len))
        }
    }

    /// Copy `size` bytes starting at `offset`
    pub(crate) fn read_range(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        match self {
            Self::Detached => {
                if size == 0 {
                    Ok(Vec::new())
                } else {
                    Err(out_of_bounds(offset, size, 0).into())
                }
            }
            Self::Mapped(mmap) => {
                let start = usize::try_from(offset)
                    .map_err(|_| out_of_bounds(offset, size, mmap.len() as u64))?;
                let end = start
                    .checked_add(size)
                    .filter(|&end| end <= mmap.len())
                    .ok_or_else(|| out_of_bounds(offset, size, mmap.len() as u64))?;
                Ok(mmap[start..end].to_vec())
            }
            Self::File(file) => {
                let mut reader = file;
                reader.seek(SeekFrom::Start(offset))?;
                let mut buffer = vec![0u8; size];
                reader.read_exact(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

fn out_of_bounds(offset: u64, size: usize, len: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("read beyond end of file: {offset:#x} + {size:#x} > {len:#x}"),
    )
}
