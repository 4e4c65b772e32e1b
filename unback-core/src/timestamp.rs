//! Packed DOS date/time stamps as stored in file-entry records.
//!
//! Two little-endian 16-bit words. Time word: bits [4:0] seconds/2,
//! [10:5] minutes, [15:11] hours. Date word: bits [4:0] day, [8:5] month,
//! [15:9] years since 1980. The on-disk format never validates these, so
//! decoding is total: out-of-range fields (month 0, hour 31) pass through.

use std::fmt;
use std::time::SystemTime;

use chrono::{Local, NaiveDate, TimeZone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosTimestamp {
    /// Seconds divided by two, as stored (nominally 0–29).
    pub seconds2: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day: u8,
    pub month: u8,
    /// Full calendar year (stored offset + 1980).
    pub year: u16,
}

impl DosTimestamp {
    pub fn decode(raw: [u8; 4]) -> Self {
        let time = u16::from_le_bytes([raw[0], raw[1]]);
        let date = u16::from_le_bytes([raw[2], raw[3]]);
        DosTimestamp {
            seconds2: (time & 0x1F) as u8,
            minutes: ((time >> 5) & 0x3F) as u8,
            hours: ((time >> 11) & 0x1F) as u8,
            day: (date & 0x1F) as u8,
            month: ((date >> 5) & 0x0F) as u8,
            year: ((date >> 9) & 0x7F) + 1980,
        }
    }

    /// Wall-clock time for mtime restoration, with the stored seconds doubled
    /// back to their even 0–58 value. `None` when the fields do not name a
    /// representable local time (the format allows storing such stamps).
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let naive = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_opt(
                self.hours as u32,
                self.minutes as u32,
                self.seconds2 as u32 * 2,
            )?;
        let local = Local.from_local_datetime(&naive).earliest()?;
        Some(SystemTime::from(local))
    }
}

impl fmt::Display for DosTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hour12, half) = match self.hours {
            0 => (12, "AM"),
            1..=11 => (self.hours, "AM"),
            12 => (12, "PM"),
            h => (h - 12, "PM"),
        };
        write!(
            f,
            "{:02}/{:02}/{:04} {:02}:{:02} {}",
            self.month, self.day, self.year, hour12, self.minutes, half
        )
    }
}
