//! Date fields and day windows
//!
//! Every family splits dates into a two-byte year followed by month and day,
//! but the year base and byte order differ per family.

use crate::types::{BandError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Offset applied to the two-byte year field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearBase {
    Absolute,
    Since1900,
    Since2000,
}

impl YearBase {
    fn offset(self) -> i32 {
        match self {
            YearBase::Absolute => 0,
            YearBase::Since1900 => 1900,
            YearBase::Since2000 => 2000,
        }
    }

    /// Raw field value for a calendar year
    pub fn encode(self, year: i32) -> Result<u16> {
        u16::try_from(year - self.offset())
            .map_err(|_| BandError::InvalidParameter(format!("year {} out of range", year)))
    }

    pub fn decode(self, raw: u16) -> i32 {
        i32::from(raw) + self.offset()
    }
}

/// Encode `year(2) month day` with the given base and byte order
pub fn encode_date(date: NaiveDate, base: YearBase, big_endian: bool) -> Result<[u8; 4]> {
    let year = base.encode(date.year())?;
    let y = if big_endian {
        year.to_be_bytes()
    } else {
        year.to_le_bytes()
    };
    Ok([y[0], y[1], date.month() as u8, date.day() as u8])
}

/// Decode `year(2) month day` from the first four bytes
pub fn decode_date(bytes: &[u8], base: YearBase, big_endian: bool) -> Option<NaiveDate> {
    if bytes.len() < 4 {
        return None;
    }
    let raw = if big_endian {
        u16::from_be_bytes([bytes[0], bytes[1]])
    } else {
        u16::from_le_bytes([bytes[0], bytes[1]])
    };
    NaiveDate::from_ymd_opt(base.decode(raw), u32::from(bytes[2]), u32::from(bytes[3]))
}

/// Number of days `date` lies before `now`, bounded by `max_days`
pub fn day_offset(date: NaiveDate, now: NaiveDateTime, max_days: u8) -> Result<u8> {
    let days = (now.date() - date).num_days();
    if days < 0 || days > i64::from(max_days) {
        return Err(BandError::InvalidParameter(format!(
            "history for {} not available ({} days back, max {})",
            date, days, max_days
        )));
    }
    Ok(days as u8)
}

/// The day a history record covers, together with the moment it was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub now: NaiveDateTime,
}

impl DayWindow {
    pub fn new(date: NaiveDate, now: NaiveDateTime) -> Self {
        Self { date, now }
    }

    /// The record covers a partially elapsed day
    pub fn is_today(&self) -> bool {
        self.date == self.now.date()
    }

    /// Bucket containing the current time of day
    pub fn current_bucket(&self, bucket_minutes: u32) -> u32 {
        let minutes = self.now.hour() * 60 + self.now.minute();
        minutes / bucket_minutes.max(1)
    }

    /// Whether a slot index still lies inside the meaningful part of the day
    pub fn admits(&self, index: u32, bucket_minutes: u32) -> bool {
        !self.is_today() || index <= self.current_bucket(bucket_minutes)
    }

    /// Sleep start minutes count from 18:00 on the evening before the record date
    pub fn sleep_anchor(&self) -> NaiveDateTime {
        (self.date - chrono::Duration::days(1)).and_time(chrono::NaiveTime::default())
            + chrono::Duration::hours(18)
    }

    /// Start of a bucket; indices past midnight roll into the next day
    pub fn bucket_start(&self, index: u32, bucket_minutes: u32) -> NaiveDateTime {
        self.date.and_time(chrono::NaiveTime::default())
            + chrono::Duration::minutes(i64::from(index) * i64::from(bucket_minutes))
    }
}
