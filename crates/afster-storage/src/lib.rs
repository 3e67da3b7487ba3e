//! Read-write storage engine for AFS archives and AFL label stores.
//!
//! This crate owns the files that `afster-formats` only knows how to encode.
//! It is organized in three layers:
//!
//! - **Archive**: an open AFS file. Holds the entry table in memory, serves
//!   extraction, stages replacements (moving an entry to the end of the file
//!   when it outgrows its slot) and writes everything back on save.
//! - **Label store**: an open AFL file. Holds the name table and can copy its
//!   names into an archive.
//! - **Registry**: process-wide tables of generation-tagged handles for
//!   callers that cannot hold Rust values directly (FFI facades, scripting
//!   bindings). Released handles fail with [`StorageError::UseAfterFree`].
//!
//! # Example
//!
//! ```rust,no_run
//! use afster_storage::{Archive, LabelStore, NameTarget};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut archive = Archive::open("VOICE.AFS")?;
//! let labels = LabelStore::open("VOICE.AFL")?;
//! labels.import_into(&mut archive, NameTarget::OverlayOnly)?;
//!
//! archive.replace_entry(3, &std::fs::read("new_line.adx")?)?;
//! archive.save_as("VOICE_PATCHED.AFS")?;
//! # Ok(())
//! # }
//! ```
//!
//! Every handle is single-owner: methods that change state take `&mut self`,
//! and nothing coordinates two archives opened on the same path.

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use afster_formats::NameError;
use afster_formats::afl::AflError;
use afster_formats::afs::AfsError;
use thiserror::Error;

// Open AFS archives
pub mod archive;

// Open AFL label stores
pub mod labels;

// Handle tables
pub mod handle;

// Configuration
pub mod config;

pub use afster_formats::{MAX_ENTRIES, Timestamp};
pub use archive::{
    Archive, ArchiveBuilder, DirectoryImport, EntryIndex, EntryMetadata, EntrySummary,
    ExtractReport, NameTarget,
};
pub use config::StorageConfig;
pub use handle::{Handle, HandleGuard, HandleTable, Registry};
pub use labels::LabelStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header or table failed structural validation.
    #[error("Malformed format: {0}")]
    MalformedFormat(String),

    /// Entry ID outside `[0, count)`.
    #[error("Invalid entry ID {id} (entry count {count})")]
    InvalidId {
        /// Requested ID as supplied by the caller
        id: i64,
        /// Number of entries
        count: usize,
    },

    /// Requested entry count above the format limit.
    #[error("Entry count {requested} exceeds the limit of {max}")]
    LimitExceeded {
        /// Requested count
        requested: usize,
        /// Format limit
        max: usize,
    },

    /// Label store and archive disagree on the number of entries.
    #[error(
        "Count mismatch: {labels} labels for {entries} entries ({imported} names imported)"
    )]
    CountMismatch {
        /// Names in the label store
        labels: usize,
        /// Entries in the archive
        entries: usize,
        /// Names copied before the mismatch was reported
        imported: usize,
    },

    /// Operation on a handle that was already released.
    #[error("Handle {0} has been released")]
    UseAfterFree(Handle),

    /// Name does not fit the fixed 0x20-byte buffer.
    #[error("Invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// Paired sequences passed to a bulk operation differ in length.
    #[error("Length mismatch: {ids} entry IDs but {sources} sources")]
    LengthMismatch {
        /// Number of IDs
        ids: usize,
        /// Number of paths or payloads
        sources: usize,
    },

    /// A bulk operation stopped part way through.
    ///
    /// Items before `failed_id` were applied and stay applied.
    #[error("Stopped at entry {failed_id} after {applied} successful items: {source}")]
    PartialFailure {
        /// Items applied before the failure
        applied: usize,
        /// Entry ID of the failing item
        failed_id: i64,
        /// Why it failed
        #[source]
        source: Box<StorageError>,
    },

    /// Archive would grow past the 32-bit offset range.
    #[error("Archive too large: {required:#x} bytes needed, offsets are 32-bit")]
    ArchiveTooLarge {
        /// Bytes the archive would need
        required: u64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Fieldless classification of [`StorageError`].
///
/// Callers use it to decide whether to retry ([`ErrorKind::Io`]), give up on
/// the file ([`ErrorKind::MalformedFormat`]) or fix their arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`StorageError::Io`]
    Io,
    /// See [`StorageError::MalformedFormat`]
    MalformedFormat,
    /// See [`StorageError::InvalidId`]
    InvalidId,
    /// See [`StorageError::LimitExceeded`]
    LimitExceeded,
    /// See [`StorageError::CountMismatch`]
    CountMismatch,
    /// See [`StorageError::UseAfterFree`]
    UseAfterFree,
    /// See [`StorageError::InvalidName`]
    InvalidName,
    /// See [`StorageError::LengthMismatch`]
    LengthMismatch,
    /// See [`StorageError::ArchiveTooLarge`]
    ArchiveTooLarge,
    /// See [`StorageError::Config`]
    Config,
}

impl StorageError {
    /// Classify this error.
    ///
    /// [`StorageError::PartialFailure`] reports the kind of its cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::MalformedFormat(_) => ErrorKind::MalformedFormat,
            Self::InvalidId { .. } => ErrorKind::InvalidId,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::CountMismatch { .. } => ErrorKind::CountMismatch,
            Self::UseAfterFree(_) => ErrorKind::UseAfterFree,
            Self::InvalidName(_) => ErrorKind::InvalidName,
            Self::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            Self::PartialFailure { source, .. } => source.kind(),
            Self::ArchiveTooLarge { .. } => ErrorKind::ArchiveTooLarge,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<AfsError> for StorageError {
    fn from(e: AfsError) -> Self {
        match e {
            AfsError::Io(io) => Self::Io(io),
            other => Self::MalformedFormat(other.to_string()),
        }
    }
}

impl From<AflError> for StorageError {
    fn from(e: AflError) -> Self {
        match e {
            AflError::Io(io) => Self::Io(io),
            AflError::Name(name) => Self::InvalidName(name),
            AflError::IndexOutOfRange { index, count } => Self::InvalidId {
                id: i64::try_from(index).unwrap_or(i64::MAX),
                count,
            },
            AflError::CountMismatch { labels, entries } => Self::CountMismatch {
                labels,
                entries,
                imported: 0,
            },
            other => Self::MalformedFormat(other.to_string()),
        }
    }
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
