//! Fixed-width, NUL-padded entry names
//!
//! Both the AFS metadata table and AFL label lists store names in a 0x20-byte
//! buffer. The text runs up to the first NUL byte; anything after it is
//! ignored when decoding but kept verbatim so that unmodified names survive a
//! parse/build cycle byte for byte.

use binrw::{BinRead, BinWrite};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Size of a name buffer in bytes.
pub const NAME_BUFFER_SIZE: usize = 0x20;

/// Longest name that still leaves room for the terminating NUL.
pub const MAX_NAME_LEN: usize = NAME_BUFFER_SIZE - 1;

/// Errors raised when encoding a name into its fixed buffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Name does not fit in the buffer with its terminator
    #[error("Name too long: {len} bytes, at most {max} allowed", max = MAX_NAME_LEN)]
    TooLong {
        /// Length of the rejected name in bytes
        len: usize,
    },

    /// Name contains a NUL byte, which would truncate it on decode
    #[error("Name contains a NUL byte at position {0}")]
    InteriorNul(usize),
}

/// A 0x20-byte, NUL-padded name buffer
#[derive(Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct EntryName([u8; NAME_BUFFER_SIZE]);

impl EntryName {
    /// An all-zero (blank) name
    pub const fn empty() -> Self {
        Self([0u8; NAME_BUFFER_SIZE])
    }

    /// Encode `name` into a fresh buffer
    pub fn new(name: &str) -> Result<Self, NameError> {
        let bytes = name.as_bytes();
        if let Some(pos) = bytes.iter().position(|&b| b == 0) {
            return Err(NameError::InteriorNul(pos));
        }
        if bytes.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong { len: bytes.len() });
        }

        let mut buffer = [0u8; NAME_BUFFER_SIZE];
        buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(buffer))
    }

    /// Wrap a raw buffer as read from disk
    pub const fn from_bytes(bytes: [u8; NAME_BUFFER_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw buffer, including anything after the terminator
    pub const fn as_bytes(&self) -> &[u8; NAME_BUFFER_SIZE] {
        &self.0
    }

    /// Bytes up to (not including) the first NUL
    pub fn text_bytes(&self) -> &[u8] {
        let end = self
            .0
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_BUFFER_SIZE);
        &self.0[..end]
    }

    /// Decoded text; invalid UTF-8 is replaced rather than rejected
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.text_bytes())
    }

    /// True if the name has no text
    pub const fn is_blank(&self) -> bool {
        self.0[0] == 0
    }
}

impl Default for EntryName {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryName").field(&self.as_str()).finish()
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl TryFrom<&str> for EntryName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
