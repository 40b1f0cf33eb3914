// Device calendar integration
// Permission, enumeration and entry creation behind one trait, plus the
// adapter that turns an event into a calendar entry.

use crate::error::AppResult;
use crate::models::{CalendarInfo, NewCalendarEntry, PermissionStatus, Platform};
use async_trait::async_trait;

pub mod dates;
pub mod export;
pub mod ics;

pub use export::CalendarExporter;
pub use ics::IcsDirectoryCalendar;

/// Source name iOS gives its built-in local calendar.
pub const IOS_DEFAULT_SOURCE: &str = "Default";

#[async_trait]
pub trait DeviceCalendar: Send + Sync {
    async fn request_write_permission(&self) -> AppResult<PermissionStatus>;

    async fn list_calendars(&self) -> AppResult<Vec<CalendarInfo>>;

    /// Create an entry and return its id.
    async fn create_event(&self, calendar_id: &str, entry: &NewCalendarEntry) -> AppResult<String>;
}

/// Pick the calendar new entries go to: the first primary one (or, on iOS,
/// the first from the "Default" source), else the first listed.
pub fn select_default_calendar(calendars: &[CalendarInfo], platform: Platform) -> Option<&CalendarInfo> {
    calendars
        .iter()
        .find(|cal| {
            cal.is_primary || (platform == Platform::Ios && cal.source.name == IOS_DEFAULT_SOURCE)
        })
        .or_else(|| calendars.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_primary() {
        let calendars = vec![
            CalendarInfo::new("work", "Exchange", false),
            CalendarInfo::new("personal", "Local", true),
        ];
        let chosen = select_default_calendar(&calendars, Platform::Android).unwrap();
        assert_eq!(chosen.id, "personal");
    }

    #[test]
    fn test_ios_default_source_counts_as_primary() {
        let calendars = vec![
            CalendarInfo::new("work", "Exchange", false),
            CalendarInfo::new("home", "Default", false),
        ];
        assert_eq!(select_default_calendar(&calendars, Platform::Ios).unwrap().id, "home");
        // only on iOS
        assert_eq!(select_default_calendar(&calendars, Platform::Android).unwrap().id, "work");
    }

    #[test]
    fn test_falls_back_to_first() {
        let calendars = vec![
            CalendarInfo::new("a", "Local", false),
            CalendarInfo::new("b", "Local", false),
        ];
        assert_eq!(select_default_calendar(&calendars, Platform::Other).unwrap().id, "a");
    }

    #[test]
    fn test_empty_enumeration() {
        assert!(select_default_calendar(&[], Platform::Ios).is_none());
    }
}
