//! Complete AFL file: header plus name table

use crate::afl::error::{AflError, Result};
use crate::afl::header::{AFL_HEADER_SIZE, AflHeader};
use crate::name::{EntryName, NAME_BUFFER_SIZE};
use crate::{AfsterFormat, MAX_ENTRIES};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Parsed AFL file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AflFile {
    /// File header
    pub header: AflHeader,
    /// Names indexed by entry ID
    pub names: Vec<EntryName>,
}

impl AflFile {
    /// Label list with `count` blank names
    pub fn new(count: usize) -> Result<Self> {
        if count > MAX_ENTRIES {
            return Err(AflError::TooManyNames {
                count,
                max: MAX_ENTRIES,
            });
        }

        Ok(Self {
            header: AflHeader::new(count as u32),
            names: vec![EntryName::empty(); count],
        })
    }

    /// Label list holding `names` in order
    pub fn from_names(names: Vec<EntryName>) -> Result<Self> {
        let mut file = Self::new(names.len())?;
        file.names = names;
        Ok(file)
    }

    /// Number of names
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Encoded length of a file with `count` names
    pub const fn encoded_len_for(count: usize) -> usize {
        AFL_HEADER_SIZE + count * NAME_BUFFER_SIZE
    }

    /// Name at `index`
    pub fn name(&self, index: usize) -> Result<&EntryName> {
        self.names.get(index).ok_or(AflError::IndexOutOfRange {
            index,
            count: self.names.len(),
        })
    }

    /// Replace the name at `index`
    pub fn set_name(&mut self, index: usize, name: &str) -> Result<()> {
        let count = self.names.len();
        let slot = self
            .names
            .get_mut(index)
            .ok_or(AflError::IndexOutOfRange { index, count })?;
        *slot = EntryName::new(name)?;
        Ok(())
    }

    /// Number of names that line up with an archive of `entry_count` entries
    ///
    /// Fails with [`AflError::CountMismatch`] when the counts differ; callers
    /// that accept a partial match can still use `min(labels, entries)`.
    pub fn check_count(&self, entry_count: usize) -> Result<usize> {
        if self.names.len() == entry_count {
            Ok(entry_count)
        } else {
            Err(AflError::CountMismatch {
                labels: self.names.len(),
                entries: entry_count,
            })
        }
    }

    /// Parse an AFL file
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < AFL_HEADER_SIZE {
            return Err(AflError::TruncatedData {
                expected: AFL_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let header = AflHeader::read(&mut cursor)?;
        header.validate()?;

        let count = header.name_count as usize;
        let expected = Self::encoded_len_for(count);
        if data.len() < expected {
            return Err(AflError::TruncatedData {
                expected,
                actual: data.len(),
            });
        }

        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            names.push(EntryName::read(&mut cursor)?);
        }

        Ok(Self { header, names })
    }

    /// Build the AFL file to binary data
    pub fn build(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut buffer = Vec::with_capacity(Self::encoded_len_for(self.names.len()));
        let mut cursor = Cursor::new(&mut buffer);
        self.header.write(&mut cursor)?;
        for name in &self.names {
            name.write(&mut cursor)?;
        }
        Ok(buffer)
    }

    /// Validate header/name table consistency
    pub fn validate(&self) -> Result<()> {
        self.header.validate()?;

        if self.names.len() != self.header.name_count as usize {
            return Err(AflError::NameCountMismatch {
                expected: self.header.name_count,
                actual: self.names.len(),
            });
        }

        Ok(())
    }
}

impl AfsterFormat for AflFile {
    fn parse(data: &[u8]) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Self::parse(data).map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }

    fn build(&self) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
        self.build()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }
}
