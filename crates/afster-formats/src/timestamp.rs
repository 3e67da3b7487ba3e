//! Last-modified timestamps stored in the AFS metadata table
//!
//! Layout (12 bytes, little-endian):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 2    | Year |
//! | 0x02   | 2    | Month (1-12) |
//! | 0x04   | 2    | Day (1-31) |
//! | 0x06   | 2    | Hours |
//! | 0x08   | 2    | Minutes |
//! | 0x0A   | 2    | Seconds |
//!
//! Archives written without timestamps leave all six fields zero, so an
//! all-zero record means "no timestamp stored".

use binrw::{BinRead, BinWrite};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;

/// Size of an encoded timestamp in bytes.
pub const TIMESTAMP_SIZE: usize = 12;

/// Calendar timestamp as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct Timestamp {
    /// Full year, e.g. 2004
    pub year: u16,
    /// Month of year, 1-based
    pub month: u16,
    /// Day of month, 1-based
    pub day: u16,
    /// Hour of day
    pub hours: u16,
    /// Minute of hour
    pub minutes: u16,
    /// Second of minute
    pub seconds: u16,
}

impl Timestamp {
    /// Create a timestamp from its six fields
    pub const fn new(
        year: u16,
        month: u16,
        day: u16,
        hours: u16,
        minutes: u16,
        seconds: u16,
    ) -> Self {
        Self {
            year,
            month,
            day,
            hours,
            minutes,
            seconds,
        }
    }

    /// True if every field is zero (no timestamp recorded)
    pub const fn is_unset(&self) -> bool {
        self.year == 0
            && self.month == 0
            && self.day == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
    }

    /// `None` for the all-zero record, otherwise the timestamp itself
    pub const fn into_option(self) -> Option<Self> {
        if self.is_unset() { None } else { Some(self) }
    }

    /// On-disk form of an optional timestamp
    pub fn from_option(value: Option<Self>) -> Self {
        value.unwrap_or_default()
    }

    /// Convert to a chrono date-time, if the fields form a valid date
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_opt(
            u32::from(self.hours),
            u32::from(self.minutes),
            u32::from(self.seconds),
        )
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        // Years outside u16 cannot be represented; clamp to the nearest end.
        let year = u16::try_from(value.year().max(0)).unwrap_or(u16::MAX);
        Self {
            year,
            month: value.month() as u16,
            day: value.day() as u16,
            hours: value.hour() as u16,
            minutes: value.minute() as u16,
            seconds: value.second() as u16,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}.{:02}.{:04} {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hours, self.minutes, self.seconds
        )
    }
}
