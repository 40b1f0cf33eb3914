#![allow(dead_code)]
// file: src/models/sync.rs
use super::event::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel category that disables filtering.
pub const ALL_CATEGORIES: &str = "All";

/// Filter options offered by the event list.
pub const DEFAULT_CATEGORIES: [&str; 4] = [ALL_CATEGORIES, "Music", "Tech", "Art"];

/// Full contents of a collection at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub documents: Vec<Document>,
    pub received_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readiness {
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(category: &str) -> Self {
        if category == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(category.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CategoryFilter::All => ALL_CATEGORIES,
            CategoryFilter::Only(category) => category,
        }
    }
}

impl Default for CategoryFilter {
    fn default() -> Self {
        CategoryFilter::All
    }
}

/// Messages pushed to whoever owns the event list.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotice {
    SnapshotApplied { events: usize },
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub readiness: Readiness,
    pub snapshots_applied: u64,
    pub last_snapshot_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn loading() -> Self {
        Self {
            readiness: Readiness::Loading,
            snapshots_applied: 0,
            last_snapshot_at: None,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_filter_sentinel() {
        assert_eq!(CategoryFilter::parse("All"), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse("Music"),
            CategoryFilter::Only("Music".to_string())
        );
        // the sentinel is case sensitive, like the filter bar labels
        assert_eq!(
            CategoryFilter::parse("all"),
            CategoryFilter::Only("all".to_string())
        );
    }

    #[test]
    fn test_status_starts_loading() {
        let status = SyncStatus::loading();
        assert_eq!(status.readiness, Readiness::Loading);
        assert_eq!(status.snapshots_applied, 0);
        assert!(status.last_error.is_none());
    }
}
