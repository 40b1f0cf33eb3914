//! Configuration module
//!
//! Settings come from `EVENTLISTING_*` environment variables. `from_lookup`
//! takes any key lookup so tests do not have to touch the process
//! environment.

use crate::calendar::dates::EventTimeZone;
use crate::error::{AppError, AppResult};
use crate::models::Platform;
use crate::store::firestore::{FirestoreConfig, DEFAULT_BASE_URL};
use crate::store::EVENTS_COLLECTION;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "EVENTLISTING_";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,
    pub collection: String,
    pub poll_interval: Duration,
    pub calendar_dir: PathBuf,
    pub primary_calendar: Option<String>,
    pub timezone: EventTimeZone,
    pub platform: Platform,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            collection: EVENTS_COLLECTION.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            calendar_dir: default_calendar_dir(),
            primary_calendar: None,
            timezone: EventTimeZone::Local,
            platform: Platform::current(),
        }
    }
}

/// `<data dir>/eventlisting/calendars`, or a relative `calendars` directory
/// when the platform has no data dir.
pub fn default_calendar_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("eventlisting"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calendars")
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `lookup`, which receives full variable names
    /// (`EVENTLISTING_PROJECT_ID`, ...). Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = AppConfig::default();
        config.project_id = get("PROJECT_ID");
        config.api_key = get("API_KEY");
        if let Some(base_url) = get("BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(collection) = get("COLLECTION") {
            config.collection = collection;
        }
        if let Some(secs) = get("POLL_INTERVAL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| AppError::config(format!("Invalid poll interval: {}", secs)))?;
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(dir) = get("CALENDAR_DIR") {
            config.calendar_dir = PathBuf::from(dir);
        }
        config.primary_calendar = get("PRIMARY_CALENDAR");
        if let Some(zone) = get("TIMEZONE") {
            config.timezone = EventTimeZone::parse(&zone)?;
        }
        if let Some(platform) = get("PLATFORM") {
            config.platform = Platform::parse(&platform).map_err(AppError::config)?;
        }

        Ok(config)
    }

    /// Checks everything needed to talk to the remote store.
    pub fn validate(&self) -> AppResult<()> {
        info!("Validating configuration");
        if self.project_id.is_none() {
            return Err(AppError::config(format!(
                "{}PROJECT_ID must be set",
                ENV_PREFIX
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(AppError::config("Poll interval must be at least one second"));
        }
        if self.collection.contains('/') {
            return Err(AppError::config(format!(
                "Collection must be a top-level collection id, got '{}'",
                self.collection
            )));
        }
        Ok(())
    }

    pub fn firestore(&self) -> AppResult<FirestoreConfig> {
        self.validate()?;
        let project_id = self.project_id.clone().unwrap_or_default();
        let mut config = FirestoreConfig::new(project_id);
        config.base_url = self.base_url.clone();
        config.api_key = self.api_key.clone();
        config.poll_interval = self.poll_interval;
        Ok(config)
    }
}
