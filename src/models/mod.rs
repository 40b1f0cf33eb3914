#![allow(unused_imports)]
// file: src/models/mod.rs

// Declare modules
pub mod calendar;
pub mod event;
pub mod notice;
pub mod sync;

// Re-export all public types so callers can use `crate::models::EventRecord`.
pub use calendar::{
    CalendarInfo, CalendarSource, ExportReceipt, NewCalendarEntry, PermissionStatus, Platform,
    Reminder,
};
pub use event::{Document, EventRecord, RSVP_FIELD};
pub use notice::Notice;
pub use sync::{
    CategoryFilter, Readiness, Snapshot, SyncNotice, SyncStatus, ALL_CATEGORIES,
    DEFAULT_CATEGORIES,
};
