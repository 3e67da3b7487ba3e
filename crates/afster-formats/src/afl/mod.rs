//! AFL label list format support
//!
//! An AFL file stores one display name per AFS entry ID, independently of
//! the archive itself. Games ship them next to archives whose own metadata
//! table is missing or blank.
//!
//! # AFL Structure
//!
//! | Offset | Size         | Field |
//! |--------|--------------|-------|
//! | 0x00   | 4            | Magic `"AFL\0"` |
//! | 0x04   | 4            | Unknown (new files write 1) |
//! | 0x08   | 4            | Unknown, signed (new files write -1) |
//! | 0x0C   | 4            | Name count |
//! | 0x10   | 0x20 * count | NUL-padded names |
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use afster_formats::afl::AflFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("VOICE.AFL")?;
//! let mut labels = AflFile::parse(&data)?;
//!
//! println!("{} names", labels.name_count());
//! labels.set_name(0, "intro.adx")?;
//! std::fs::write("VOICE_NEW.AFL", labels.build()?)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
pub mod header;

pub use error::{AflError, Result};
pub use file::AflFile;
pub use header::{AFL_HEADER_SIZE, AFL_MAGIC, AflHeader};
