//! Strict parsing of stored event dates.
//!
//! Accepted forms:
//! - RFC 3339 with an offset or `Z` (`2025-07-20T19:00:00+02:00`)
//! - wall-clock date and time, `T` or space separated, seconds optional
//!   (`2025-07-20 19:00`), read in the configured time zone
//! - a bare date (`2025-07-20`), read as midnight UTC
//!
//! Anything else is an error; a wall-clock time that does not exist or is
//! ambiguous in the zone is an error too.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const WALL_CLOCK_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Zone used for dates stored without an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventTimeZone {
    #[default]
    Local,
    Named(Tz),
}

impl EventTimeZone {
    pub fn parse(name: &str) -> AppResult<Self> {
        name.trim()
            .parse::<Tz>()
            .map(EventTimeZone::Named)
            .map_err(|_| AppError::config(format!("Unknown time zone: {}", name)))
    }

    fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            EventTimeZone::Local => Local
                .from_local_datetime(naive)
                .single()
                .map(|local| local.with_timezone(&Utc)),
            EventTimeZone::Named(tz) => tz
                .from_local_datetime(naive)
                .single()
                .map(|zoned| zoned.with_timezone(&Utc)),
        }
    }
}

pub fn parse_event_date(text: &str, zone: EventTimeZone) -> AppResult<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::invalid_date("event has an empty date"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in WALL_CLOCK_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return zone.localize(&naive).ok_or_else(|| {
                AppError::invalid_date(format!(
                    "'{}' does not name a single instant in {:?}",
                    text, zone
                ))
            });
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(AppError::invalid_date(format!("unrecognized date format: '{}'", text)))
}
