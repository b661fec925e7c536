//! MS-DOS date/time handling.
//!
//! ZIP headers store the last-modified time as two 16-bit MS-DOS fields:
//!
//! - time: `hhhhh mmmmmm sssss` (seconds stored halved, 2-second precision)
//! - date: `yyyyyyy mmmm ddddd` (years since 1980)
//!
//! The high byte of the time field doubles as the PKWARE encryption check
//! byte when an entry is streamed with a data descriptor.
//!
//! # Example
//!
//! ```rust
//! use zipvault::DosDateTime;
//!
//! let ts = DosDateTime::from_parts(2024, 2, 29, 13, 45, 31).unwrap();
//! assert_eq!(ts.year(), 2024);
//! assert_eq!(ts.second(), 30); // two-second precision
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1970-01-01 and 1980-01-01.
const DOS_EPOCH_UNIX_SECS: u64 = 315_532_800;

/// A last-modified timestamp as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DosDateTime {
    date: u16,
    time: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable value.
    pub const EPOCH: Self = Self {
        date: (1 << 5) | 1,
        time: 0,
    };

    /// Wraps raw header fields without validation.
    #[inline]
    pub const fn from_raw(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    /// Builds a timestamp from calendar fields.
    ///
    /// Returns `None` for years outside 1980..=2107 or out-of-range fields.
    /// Odd seconds are rounded down.
    pub fn from_parts(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Option<Self> {
        if !(1980..=2107).contains(&year)
            || !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        let date = ((year - 1980) << 9) | ((month as u16) << 5) | day as u16;
        let time = ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2);
        Some(Self { date, time })
    }

    /// Converts a `SystemTime` (interpreted as UTC).
    ///
    /// Times before 1980 clamp to [`DosDateTime::EPOCH`].
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs(),
            Err(_) => return Self::EPOCH,
        };
        if secs < DOS_EPOCH_UNIX_SECS {
            return Self::EPOCH;
        }
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;
        let (year, month, day) = civil_from_days(days);
        let year = year.clamp(1980, 2107) as u16;
        Self::from_parts(
            year,
            month,
            day,
            (rem / 3600) as u8,
            ((rem % 3600) / 60) as u8,
            (rem % 60) as u8,
        )
        .unwrap_or(Self::EPOCH)
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Raw date field.
    #[inline]
    pub const fn date(&self) -> u16 {
        self.date
    }

    /// Raw time field.
    #[inline]
    pub const fn time(&self) -> u16 {
        self.time
    }

    /// Calendar year.
    pub fn year(&self) -> u16 {
        (self.date >> 9) + 1980
    }

    /// Month (1-12).
    pub fn month(&self) -> u8 {
        ((self.date >> 5) & 0x0F) as u8
    }

    /// Day of month (1-31).
    pub fn day(&self) -> u8 {
        (self.date & 0x1F) as u8
    }

    /// Hour (0-23).
    pub fn hour(&self) -> u8 {
        (self.time >> 11) as u8
    }

    /// Minute (0-59).
    pub fn minute(&self) -> u8 {
        ((self.time >> 5) & 0x3F) as u8
    }

    /// Second (even, 0-58).
    pub fn second(&self) -> u8 {
        ((self.time & 0x1F) * 2) as u8
    }
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

fn is_leap(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        _ => 28,
    }
}

/// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_parts_fields() {
        let ts = DosDateTime::from_parts(2009, 6, 15, 10, 20, 44).unwrap();
        assert_eq!(ts.year(), 2009);
        assert_eq!(ts.month(), 6);
        assert_eq!(ts.day(), 15);
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.minute(), 20);
        assert_eq!(ts.second(), 44);
    }

    #[test]
    fn test_from_parts_rejects_invalid() {
        assert!(DosDateTime::from_parts(1979, 12, 31, 0, 0, 0).is_none());
        assert!(DosDateTime::from_parts(2023, 2, 29, 0, 0, 0).is_none());
        assert!(DosDateTime::from_parts(2024, 2, 29, 0, 0, 0).is_some());
        assert!(DosDateTime::from_parts(2024, 13, 1, 0, 0, 0).is_none());
        assert!(DosDateTime::from_parts(2024, 1, 1, 24, 0, 0).is_none());
    }

    #[test]
    fn test_epoch_raw_value() {
        assert_eq!(DosDateTime::EPOCH.date(), 0x0021);
        assert_eq!(DosDateTime::EPOCH.time(), 0);
        assert_eq!(DosDateTime::EPOCH.year(), 1980);
    }

    #[test]
    fn test_from_system_time() {
        // 2000-03-01 12:34:56 UTC
        let t = UNIX_EPOCH + Duration::from_secs(951_914_096);
        let ts = DosDateTime::from_system_time(t);
        assert_eq!(
            (ts.year(), ts.month(), ts.day()),
            (2000, 3, 1)
        );
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (12, 34, 56));
    }

    #[test]
    fn test_before_dos_epoch_clamps() {
        let ts = DosDateTime::from_system_time(UNIX_EPOCH);
        assert_eq!(ts, DosDateTime::EPOCH);
    }
}
