use super::dates::{parse_event_date, EventTimeZone};
use super::{select_default_calendar, DeviceCalendar};
use crate::error::{AppError, AppResult};
use crate::models::{EventRecord, ExportReceipt, NewCalendarEntry, Notice, Platform, Reminder};
use crate::utils::logging::log_calendar_export;
use chrono::Duration;
use log::{error, info, warn};
use std::sync::Arc;

/// Events carry no duration, so every entry lasts this long.
pub const EVENT_DURATION_MINUTES: i64 = 60;
/// The single reminder fires this many minutes before the start.
pub const REMINDER_MINUTES_BEFORE: i64 = 15;

pub struct CalendarExporter {
    calendar: Arc<dyn DeviceCalendar>,
    platform: Platform,
    zone: EventTimeZone,
}

impl CalendarExporter {
    pub fn new(calendar: Arc<dyn DeviceCalendar>, platform: Platform, zone: EventTimeZone) -> Self {
        Self {
            calendar,
            platform,
            zone,
        }
    }

    /// Build the entry for `event`, or fail if its date does not parse.
    pub fn entry_for(&self, event: &EventRecord) -> AppResult<NewCalendarEntry> {
        let date = event
            .date
            .as_deref()
            .ok_or_else(|| AppError::invalid_date(format!("event '{}' has no date", event.id)))?;
        let start = parse_event_date(date, self.zone)?;

        Ok(NewCalendarEntry {
            title: event.title().to_string(),
            start,
            end: start + Duration::minutes(EVENT_DURATION_MINUTES),
            location: event.location.clone(),
            notes: event.description.clone(),
            reminders: vec![Reminder {
                relative_offset_minutes: -REMINDER_MINUTES_BEFORE,
            }],
        })
    }

    pub async fn export(&self, event: &EventRecord) -> AppResult<ExportReceipt> {
        let permission = self
            .calendar
            .request_write_permission()
            .await
            .map_err(|e| AppError::permission_denied(e.to_safe_string()))?;
        if !permission.is_granted() {
            warn!("Calendar permission denied, event '{}' not exported", event.id);
            return Err(AppError::permission_denied("calendar write access was not granted"));
        }

        let entry = self.entry_for(event).map_err(|e| {
            warn!("Cannot export event '{}': {}", event.id, e);
            e
        })?;

        let calendars = self
            .calendar
            .list_calendars()
            .await
            .map_err(|e| AppError::calendar_unavailable(e.to_safe_string()))?;
        let calendar = select_default_calendar(&calendars, self.platform)
            .ok_or_else(|| AppError::calendar_unavailable("no calendars on this device"))?;

        let entry_id = self
            .calendar
            .create_event(&calendar.id, &entry)
            .await
            .map_err(|e| {
                error!("Error creating calendar event: {}", e);
                match e {
                    AppError::Creation(_) => e,
                    other => AppError::creation(other.to_safe_string()),
                }
            })?;

        log_calendar_export(&event.id, &calendar.id);
        info!("Saved '{}' as entry '{}'", entry.title, entry_id);
        Ok(ExportReceipt {
            calendar_id: calendar.id.clone(),
            entry_id,
            start: entry.start,
            end: entry.end,
        })
    }
}

pub fn success_notice() -> Notice {
    Notice::new("Success", "Event saved to your calendar!")
}
