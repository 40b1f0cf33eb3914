// EventListing Library
// Live event list, RSVP toggling and calendar export over a remote document store

pub mod calendar;
pub mod command_handlers;
pub mod config;
pub mod error;
pub mod http_config;
pub mod models;
pub mod rsvp;
pub mod store;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use calendar::{CalendarExporter, DeviceCalendar, IcsDirectoryCalendar};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use models::*;
pub use rsvp::{RsvpOutcome, RsvpUpdater};
pub use store::{EventStore, FirestoreClient, MemoryEventStore, Subscription};
pub use sync::EventSyncCore;

use log::{info, warn};
use std::sync::Arc;

/// One store, one sync core, one RSVP updater and one exporter, wired
/// together and shared by every front end.
pub struct EventListing {
    store: Arc<dyn EventStore>,
    firestore: Option<Arc<FirestoreClient>>,
    core: Arc<EventSyncCore>,
    rsvp: RsvpUpdater,
    exporter: CalendarExporter,
    collection: String,
}

impl EventListing {
    /// Connect to Firestore and the `.ics` calendar directory described by
    /// `config`.
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        Self::connect(config, Arc::new(EventSyncCore::new())).await
    }

    /// Like [`open`](Self::open), also returning the core's notice channel.
    pub async fn open_with_notices(
        config: &AppConfig,
    ) -> AppResult<(Self, tokio::sync::mpsc::UnboundedReceiver<SyncNotice>)> {
        let (core, notices) = EventSyncCore::with_notice_channel();
        let app = Self::connect(config, Arc::new(core)).await?;
        Ok((app, notices))
    }

    async fn connect(config: &AppConfig, core: Arc<EventSyncCore>) -> AppResult<Self> {
        let firestore = Arc::new(FirestoreClient::open(config.firestore()?)?);

        let calendar = IcsDirectoryCalendar::new(&config.calendar_dir, config.primary_calendar.clone());
        if let Some(ref name) = config.primary_calendar {
            if let Err(e) = calendar.create_calendar(name).await {
                warn!("Could not prepare calendar '{}': {}", name, e);
            }
        }

        let mut app = Self::assemble(firestore.clone(), core, Arc::new(calendar), config);
        app.firestore = Some(firestore);
        info!("EventListing opened for collection '{}'", app.collection);
        Ok(app)
    }

    pub fn with_parts(
        store: Arc<dyn EventStore>,
        calendar: Arc<dyn DeviceCalendar>,
        config: &AppConfig,
    ) -> Self {
        let core = Arc::new(EventSyncCore::new());
        Self::assemble(store, core, calendar, config)
    }

    /// Like [`with_parts`](Self::with_parts), also returning the core's
    /// notice channel.
    pub fn with_notices(
        store: Arc<dyn EventStore>,
        calendar: Arc<dyn DeviceCalendar>,
        config: &AppConfig,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<SyncNotice>) {
        let (core, notices) = EventSyncCore::with_notice_channel();
        (Self::assemble(store, Arc::new(core), calendar, config), notices)
    }

    fn assemble(
        store: Arc<dyn EventStore>,
        core: Arc<EventSyncCore>,
        calendar: Arc<dyn DeviceCalendar>,
        config: &AppConfig,
    ) -> Self {
        let rsvp = RsvpUpdater::new(store.clone(), core.clone(), config.collection.clone());
        let exporter = CalendarExporter::new(calendar, config.platform, config.timezone);
        Self {
            store,
            firestore: None,
            core,
            rsvp,
            exporter,
            collection: config.collection.clone(),
        }
    }

    pub fn activate(&self) -> AppResult<()> {
        self.core.activate(self.store.as_ref(), &self.collection)
    }

    pub fn core(&self) -> &Arc<EventSyncCore> {
        &self.core
    }

    pub fn rsvp(&self) -> &RsvpUpdater {
        &self.rsvp
    }

    pub fn exporter(&self) -> &CalendarExporter {
        &self.exporter
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Export the event `id` from the current list.
    pub async fn export_event(&self, id: &str) -> AppResult<ExportReceipt> {
        let event = self
            .core
            .find(id)
            .ok_or_else(|| AppError::invalid_input(format!("No event with id '{}'", id)))?;
        self.exporter.export(&event).await
    }

    /// Stop syncing and release the store connection.
    pub fn close(&self) {
        self.core.deactivate();
        if let Some(ref firestore) = self.firestore {
            firestore.close();
        }
        info!("EventListing closed");
    }
}
