//! Calendar backed by a directory of `.ics` files.
//!
//! Layout: `<root>/<calendar>/<entry uid>.ics`. Every subdirectory of the
//! root is one calendar.

use super::DeviceCalendar;
use crate::error::{AppError, AppResult};
use crate::models::{CalendarInfo, NewCalendarEntry, PermissionStatus};
use async_trait::async_trait;
use chrono::Duration;
use icalendar::{Alarm, Calendar, Component, EventLike, Trigger};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Source name reported for directory calendars.
pub const LOCAL_SOURCE: &str = "Local";

pub struct IcsDirectoryCalendar {
    root: PathBuf,
    primary: Option<String>,
}

impl IcsDirectoryCalendar {
    pub fn new(root: impl Into<PathBuf>, primary: Option<String>) -> Self {
        Self {
            root: root.into(),
            primary,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the calendar directory `name` if it is missing.
    pub async fn create_calendar(&self, name: &str) -> AppResult<()> {
        validate_calendar_name(name)?;
        tokio::fs::create_dir_all(self.root.join(name)).await?;
        info!("Calendar '{}' ready under {}", name, self.root.display());
        Ok(())
    }
}

fn validate_calendar_name(name: &str) -> AppResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(AppError::invalid_input(format!("Invalid calendar name: {:?}", name)));
    }
    Ok(())
}

/// Render `entry` as a standalone VCALENDAR with one VEVENT.
pub fn render_entry(uid: &str, entry: &NewCalendarEntry) -> String {
    let mut event = icalendar::Event::new();
    event.uid(uid);
    event.summary(&entry.title);
    event.starts(entry.start);
    event.ends(entry.end);

    if let Some(ref location) = entry.location {
        event.location(location);
    }
    if let Some(ref notes) = entry.notes {
        event.description(notes);
    }

    for reminder in &entry.reminders {
        let minutes_before = (-reminder.relative_offset_minutes).max(0);
        let trigger = Trigger::before_start(Duration::minutes(minutes_before));
        event.alarm(Alarm::display("Reminder", trigger));
    }

    let mut cal = Calendar::new();
    cal.push(event.done());
    cal.done().to_string()
}

#[async_trait]
impl DeviceCalendar for IcsDirectoryCalendar {
    async fn request_write_permission(&self) -> AppResult<PermissionStatus> {
        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            warn!("Calendar root {} is not usable: {}", self.root.display(), e);
            return Ok(PermissionStatus::Denied);
        }
        let metadata = tokio::fs::metadata(&self.root).await?;
        if metadata.permissions().readonly() {
            warn!("Calendar root {} is read-only", self.root.display());
            return Ok(PermissionStatus::Denied);
        }
        Ok(PermissionStatus::Granted)
    }

    async fn list_calendars(&self) -> AppResult<Vec<CalendarInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| {
                let is_primary = self.primary.as_deref() == Some(name.as_str());
                CalendarInfo::new(name, LOCAL_SOURCE, is_primary)
            })
            .collect())
    }

    async fn create_event(&self, calendar_id: &str, entry: &NewCalendarEntry) -> AppResult<String> {
        validate_calendar_name(calendar_id).map_err(|e| AppError::creation(e.to_string()))?;
        let dir = self.root.join(calendar_id);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(AppError::creation(format!("Calendar '{}' does not exist", calendar_id)));
        }

        let uid = uuid::Uuid::new_v4().to_string();
        let path = dir.join(format!("{}.ics", uid));
        tokio::fs::write(&path, render_entry(&uid, entry))
            .await
            .map_err(|e| AppError::creation(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!("Wrote calendar entry {}", path.display());
        Ok(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reminder;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn entry() -> NewCalendarEntry {
        let start = Utc.with_ymd_and_hms(2025, 7, 20, 19, 0, 0).unwrap();
        NewCalendarEntry {
            title: "Jazz Night".to_string(),
            start,
            end: start + Duration::minutes(60),
            location: Some("Blue Note".to_string()),
            notes: Some("Live quartet".to_string()),
            reminders: vec![Reminder { relative_offset_minutes: -15 }],
        }
    }

    #[test]
    fn test_render_entry_has_one_alarm() {
        let ics = render_entry("uid-1", &entry());
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("SUMMARY:Jazz Night"));
        assert!(ics.contains("LOCATION:Blue Note"));
        assert!(ics.contains("DESCRIPTION:Live quartet"));
        assert!(ics.contains("UID:uid-1"));
        assert_eq!(ics.matches("BEGIN:VALARM").count(), 1);
        assert!(ics.contains("ACTION:DISPLAY"));
        assert!(ics.contains("TRIGGER"));
    }

    #[tokio::test]
    async fn test_list_calendars_sorted_with_primary() {
        let dir = TempDir::new().unwrap();
        let calendar = IcsDirectoryCalendar::new(dir.path(), Some("personal".to_string()));
        calendar.create_calendar("work").await.unwrap();
        calendar.create_calendar("personal").await.unwrap();
        std::fs::write(dir.path().join("stray.txt"), "not a calendar").unwrap();

        let calendars = calendar.list_calendars().await.unwrap();
        let ids: Vec<_> = calendars.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["personal", "work"]);
        assert!(calendars[0].is_primary);
        assert!(!calendars[1].is_primary);
        assert_eq!(calendars[0].source.name, LOCAL_SOURCE);
    }

    #[tokio::test]
    async fn test_missing_root_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let calendar = IcsDirectoryCalendar::new(dir.path().join("absent"), None);
        assert!(calendar.list_calendars().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_creates_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("calendars");
        let calendar = IcsDirectoryCalendar::new(&root, None);
        assert_eq!(
            calendar.request_write_permission().await.unwrap(),
            PermissionStatus::Granted
        );
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_create_event_writes_file() {
        let dir = TempDir::new().unwrap();
        let calendar = IcsDirectoryCalendar::new(dir.path(), None);
        calendar.create_calendar("Default").await.unwrap();

        let uid = calendar.create_event("Default", &entry()).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("Default").join(format!("{}.ics", uid))).unwrap();
        assert!(written.contains("SUMMARY:Jazz Night"));
    }

    #[tokio::test]
    async fn test_create_event_in_unknown_calendar_fails() {
        let dir = TempDir::new().unwrap();
        let calendar = IcsDirectoryCalendar::new(dir.path(), None);
        let result = calendar.create_event("nope", &entry()).await;
        assert!(matches!(result, Err(AppError::Creation(_))));

        let result = calendar.create_event("../escape", &entry()).await;
        assert!(matches!(result, Err(AppError::Creation(_))));
    }
}
