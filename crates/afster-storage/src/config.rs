//! Configuration for the storage system

use crate::{Result, StorageError};
use afster_formats::afs::DEFAULT_SLOT_ALIGNMENT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the storage system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Slot boundary for payloads and the metadata table, in bytes.
    ///
    /// Relocated entries start on, and reserve a multiple of, this value.
    /// Must be a non-zero multiple of 16.
    pub slot_alignment: u32,

    /// Read payloads through a memory map instead of positioned reads
    pub enable_mmap: bool,

    /// Overwrite the unused tail of a slot with zeros when saving a payload
    pub zero_fill_slack: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            slot_alignment: DEFAULT_SLOT_ALIGNMENT,
            enable_mmap: true,
            zero_fill_slack: true,
        }
    }
}

impl StorageConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| StorageError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the slot alignment
    #[must_use]
    pub const fn with_slot_alignment(mut self, alignment: u32) -> Self {
        self.slot_alignment = alignment;
        self
    }

    /// Enable or disable memory-mapped reads
    #[must_use]
    pub const fn with_mmap(mut self, enable: bool) -> Self {
        self.enable_mmap = enable;
        self
    }

    /// Enable or disable zero-filling slot slack on save
    #[must_use]
    pub const fn with_zero_fill_slack(mut self, enable: bool) -> Self {
        self.zero_fill_slack = enable;
        self
    }

    /// Check field constraints
    pub fn validate(&self) -> Result<()> {
        if self.slot_alignment == 0 || self.slot_alignment % 16 != 0 {
            return Err(StorageError::Config(format!(
                "slot alignment must be a non-zero multiple of 16, got {}",
                self.slot_alignment
            )));
        }
        Ok(())
    }
}
