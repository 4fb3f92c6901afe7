//! Acquisition window arithmetic and the timestamp formats used on the wire and in storage keys.
use crate::error::WindowError;
use chrono::{DateTime, Duration, NaiveTime, Utc};

/// `2025-01-01T00:00:00.000000Z`
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// `20250101000000000000`
pub const COMPACT_FORMAT: &str = "%Y%m%d%H%M%S%6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AcquisitionWindow {
    /// The `n_days` preceding `end`.
    pub fn last_days(n_days: u32, end: DateTime<Utc>) -> Result<Self, WindowError> {
        let start = end
            .checked_sub_signed(Duration::days(i64::from(n_days)))
            .ok_or(WindowError { n_days, end })?;
        Ok(Self { start, end })
    }

    /// The `n_days` preceding the start of the current UTC day.
    pub fn history(n_days: u32, now: DateTime<Utc>) -> Result<Self, WindowError> {
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        Self::last_days(n_days, midnight)
    }

    /// `start/end` as the catalog expects it in the `datetime` field.
    pub fn interval(&self) -> String {
        format!("{}/{}", to_wire(&self.start), to_wire(&self.end))
    }
}

pub fn to_wire(instant: &DateTime<Utc>) -> String {
    instant.format(WIRE_FORMAT).to_string()
}

/// Parses a catalog timestamp. Fractional seconds are optional.
pub fn parse_acquisition(timestamp: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(timestamp)?.with_timezone(&Utc))
}

pub fn to_compact(instant: &DateTime<Utc>) -> String {
    instant.format(COMPACT_FORMAT).to_string()
}
