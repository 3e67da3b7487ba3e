//! Slot layout: mapping entries to the byte ranges they own
//!
//! The AFS index records where each payload starts and how long it is, but
//! not how much room was set aside for it. Tools that write AFS files pad
//! every payload to a slot boundary, so the room an entry may grow into
//! without moving is the gap between its offset and whatever comes next in
//! the file.

use crate::afs::error::{AfsError, Result};
use crate::afs::index::AfsIndex;
use std::fmt;

/// Default slot alignment used by AFS writers (must stay 16-byte aligned)
pub const DEFAULT_SLOT_ALIGNMENT: u32 = 2048;

/// A contiguous byte range with a known owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// Header plus entry table
    Index,
    /// Payload of the entry with this ID
    Entry(usize),
    /// Metadata table
    Metadata,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::Entry(id) => write!(f, "entry {id}"),
            Self::Metadata => f.write_str("metadata table"),
        }
    }
}

/// Round `value` up to the next multiple of `alignment`
///
/// An alignment of zero or one leaves the value unchanged.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

#[derive(Debug, Clone, Copy)]
struct Span {
    region: Region,
    start: u64,
    len: u64,
}

/// Derive the reserved space of every entry in `index`
///
/// Regions are ordered by start offset; ties go to the shorter region first
/// so that empty entries sharing an offset with their successor own nothing.
/// Each entry then owns the bytes up to the next region's start, and the
/// last region in the file owns everything up to `file_len`.
///
/// Fails if a region ends past `file_len` or two regions overlap.
pub fn derive_reserved(index: &AfsIndex, file_len: u64) -> Result<Vec<u32>> {
    let mut spans = Vec::with_capacity(index.entries.len() + 2);
    spans.push(Span {
        region: Region::Index,
        start: 0,
        len: index.encoded_len() as u64,
    });
    spans.extend(index.entries.iter().enumerate().map(|(id, info)| Span {
        region: Region::Entry(id),
        start: u64::from(info.offset),
        len: u64::from(info.size),
    }));
    if index.has_metadata() {
        spans.push(Span {
            region: Region::Metadata,
            start: u64::from(index.metadata.offset),
            len: u64::from(index.metadata.size),
        });
    }

    for span in &spans {
        if span.start + span.len > file_len {
            return Err(AfsError::RegionOutOfBounds {
                region: span.region,
                offset: span.start,
                size: span.len,
                file_len,
            });
        }
    }

    spans.sort_by_key(|s| (s.start, s.len, s.region));

    let mut reserved = vec![0u32; index.entries.len()];
    for (pos, span) in spans.iter().enumerate() {
        let next_start = match spans.get(pos + 1) {
            Some(next) => {
                if span.start + span.len > next.start {
                    return Err(AfsError::Overlap {
                        first: span.region,
                        second: next.region,
                    });
                }
                next.start
            }
            None => file_len,
        };

        if let Region::Entry(id) = span.region {
            reserved[id] = u32::try_from(next_start - span.start).unwrap_or(u32::MAX);
        }
    }

    Ok(reserved)
}
