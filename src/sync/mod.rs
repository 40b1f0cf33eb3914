//! Event synchronization core.
//!
//! Holds the in-memory event list fed by one store subscription. The list is
//! only ever replaced wholesale when a snapshot arrives; a subscription error
//! keeps the last good list and is surfaced on the notice channel.

use crate::error::{AppError, AppResult};
use crate::models::{
    CategoryFilter, EventRecord, Readiness, Snapshot, SyncNotice, SyncStatus,
};
use crate::store::{EventStore, SnapshotListener, Subscription};
use crate::utils::logging::log_snapshot_applied;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{mpsc, watch};

struct FeedState {
    events: Vec<EventRecord>,
    status: SyncStatus,
}

/// The part of the core shared with the store listener.
#[derive(Clone)]
struct Feed {
    state: Arc<RwLock<FeedState>>,
    ready: Arc<watch::Sender<Readiness>>,
    notices: Option<mpsc::UnboundedSender<SyncNotice>>,
}

impl Feed {
    fn read(&self) -> RwLockReadGuard<'_, FeedState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FeedState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, delivery: Result<Snapshot, AppError>) {
        let notice = match delivery {
            Ok(snapshot) => {
                let mut seen = HashSet::new();
                let mut duplicates = 0;
                let events: Vec<EventRecord> = snapshot
                    .documents
                    .iter()
                    .filter(|doc| {
                        let fresh = seen.insert(doc.id.as_str());
                        if !fresh {
                            duplicates += 1;
                        }
                        fresh
                    })
                    .map(EventRecord::from_document)
                    .collect();
                let count = events.len();

                {
                    let mut state = self.write();
                    state.events = events;
                    state.status.readiness = Readiness::Ready;
                    state.status.snapshots_applied += 1;
                    state.status.last_snapshot_at = Some(snapshot.received_at);
                    state.status.last_error = None;
                }

                log_snapshot_applied(count, duplicates);
                SyncNotice::SnapshotApplied { events: count }
            }
            Err(e) => {
                error!("Error listening for real-time updates: {}", e);
                let message = e.to_safe_string();
                {
                    let mut state = self.write();
                    state.status.readiness = Readiness::Ready;
                    state.status.last_error = Some(message.clone());
                }
                SyncNotice::Error(message)
            }
        };

        let was_loading = *self.ready.borrow() == Readiness::Loading;
        if was_loading {
            self.ready.send_replace(Readiness::Ready);
        }
        if let Some(tx) = &self.notices {
            // A dropped receiver only means nobody is listening any more.
            let _ = tx.send(notice);
        }
    }
}

pub struct EventSyncCore {
    feed: Feed,
    ready_rx: watch::Receiver<Readiness>,
    subscription: Mutex<Option<Subscription>>,
}

impl EventSyncCore {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A core that also reports every snapshot and error on the returned
    /// channel.
    pub fn with_notice_channel() -> (Self, mpsc::UnboundedReceiver<SyncNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::build(Some(tx)), rx)
    }

    fn build(notices: Option<mpsc::UnboundedSender<SyncNotice>>) -> Self {
        let (ready_tx, ready_rx) = watch::channel(Readiness::Loading);
        Self {
            feed: Feed {
                state: Arc::new(RwLock::new(FeedState {
                    events: Vec::new(),
                    status: SyncStatus::loading(),
                })),
                ready: Arc::new(ready_tx),
                notices,
            },
            ready_rx,
            subscription: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to `collection`. Calling this while a subscription is live
    /// does nothing.
    pub fn activate(&self, store: &dyn EventStore, collection: &str) -> AppResult<()> {
        let mut slot = self.slot();
        if slot.as_ref().map_or(false, Subscription::is_active) {
            warn!("Event sync already active, ignoring second activation");
            return Ok(());
        }

        let feed = self.feed.clone();
        let listener: SnapshotListener = Arc::new(move |delivery| feed.apply(delivery));

        match store.subscribe(collection, listener) {
            Ok(subscription) => {
                info!("Event sync activated for collection '{}'", collection);
                *slot = Some(subscription);
                Ok(())
            }
            Err(e) => {
                // Counts as the first subscription error: the list stops loading.
                self.feed.apply(Err(e.to_subscription()));
                Err(e)
            }
        }
    }

    /// Tear down the subscription. The last list stays readable.
    pub fn deactivate(&self) {
        if let Some(subscription) = self.slot().take() {
            subscription.unsubscribe();
            info!("Event sync deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot().as_ref().map_or(false, Subscription::is_active)
    }

    /// Feed one delivery into the core, exactly as the store listener does.
    pub fn apply(&self, delivery: Result<Snapshot, AppError>) {
        self.feed.apply(delivery);
    }

    pub fn current_events(&self) -> Vec<EventRecord> {
        self.feed.read().events.clone()
    }

    pub fn filtered_events(&self, category: &str) -> Vec<EventRecord> {
        self.filtered(&CategoryFilter::parse(category))
    }

    pub fn filtered(&self, filter: &CategoryFilter) -> Vec<EventRecord> {
        let state = self.feed.read();
        match filter {
            CategoryFilter::All => state.events.clone(),
            CategoryFilter::Only(category) => state
                .events
                .iter()
                .filter(|event| event.in_category(category))
                .cloned()
                .collect(),
        }
    }

    pub fn find(&self, id: &str) -> Option<EventRecord> {
        self.feed.read().events.iter().find(|e| e.id == id).cloned()
    }

    /// Distinct categories in list order.
    pub fn categories(&self) -> Vec<String> {
        let state = self.feed.read();
        let mut seen = HashSet::new();
        state
            .events
            .iter()
            .filter_map(|e| e.category.as_deref())
            .filter(|c| seen.insert(*c))
            .map(str::to_string)
            .collect()
    }

    pub fn readiness(&self) -> Readiness {
        self.feed.read().status.readiness
    }

    pub fn last_error(&self) -> Option<String> {
        self.feed.read().status.last_error.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.feed.read().status.clone()
    }

    /// Resolves once the first snapshot or subscription error has arrived.
    pub async fn wait_until_ready(&self) -> AppResult<()> {
        let mut rx = self.ready_rx.clone();
        rx.wait_for(|readiness| *readiness == Readiness::Ready)
            .await
            .map(|_| ())
            .map_err(|_| AppError::subscription("Event sync was shut down"))
    }
}

impl Default for EventSyncCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use serde_json::json;

    fn snapshot(docs: Vec<(&str, serde_json::Value)>) -> Snapshot {
        Snapshot::new(
            docs.into_iter()
                .map(|(id, fields)| Document::from_json(id, fields))
                .collect(),
        )
    }

    fn ids(events: &[EventRecord]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_starts_loading_and_empty() {
        let core = EventSyncCore::new();
        assert_eq!(core.readiness(), Readiness::Loading);
        assert!(core.current_events().is_empty());
        assert!(!core.is_active());
    }

    #[test]
    fn test_snapshot_replaces_list_wholesale() {
        let core = EventSyncCore::new();
        core.apply(Ok(snapshot(vec![("a", json!({})), ("b", json!({}))])));
        core.apply(Ok(snapshot(vec![("c", json!({})), ("a", json!({}))])));

        assert_eq!(ids(&core.current_events()), vec!["c", "a"]);
        assert_eq!(core.status().snapshots_applied, 2);
    }

    #[test]
    fn test_duplicate_ids_keep_first_occurrence() {
        let core = EventSyncCore::new();
        core.apply(Ok(snapshot(vec![
            ("a", json!({ "name": "first" })),
            ("a", json!({ "name": "second" })),
        ])));

        let events = core.current_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_error_keeps_last_good_list_and_flips_ready() {
        let (core, mut notices) = EventSyncCore::with_notice_channel();
        core.apply(Err(AppError::subscription("permission-denied")));
        assert_eq!(core.readiness(), Readiness::Ready);
        assert!(core.current_events().is_empty());

        core.apply(Ok(snapshot(vec![("a", json!({}))])));
        core.apply(Err(AppError::subscription("unavailable")));
        assert_eq!(ids(&core.current_events()), vec!["a"]);
        assert!(core.last_error().unwrap().contains("unavailable"));

        assert!(matches!(notices.try_recv(), Ok(SyncNotice::Error(_))));
        assert_eq!(
            notices.try_recv().unwrap(),
            SyncNotice::SnapshotApplied { events: 1 }
        );
        assert!(matches!(notices.try_recv(), Ok(SyncNotice::Error(_))));
    }

    #[test]
    fn test_snapshot_clears_last_error() {
        let core = EventSyncCore::new();
        core.apply(Err(AppError::subscription("unavailable")));
        core.apply(Ok(snapshot(vec![])));
        assert!(core.last_error().is_none());
    }

    #[test]
    fn test_filter_preserves_order() {
        let core = EventSyncCore::new();
        core.apply(Ok(snapshot(vec![
            ("a", json!({ "category": "Music" })),
            ("b", json!({ "category": "Tech" })),
            ("c", json!({ "category": "Music" })),
            ("d", json!({})),
        ])));

        assert_eq!(ids(&core.filtered_events("Music")), vec!["a", "c"]);
        assert_eq!(core.filtered_events("All"), core.current_events());
        assert!(core.filtered_events("Art").is_empty());
        assert_eq!(core.categories(), vec!["Music", "Tech"]);
    }

    #[test]
    fn test_find() {
        let core = EventSyncCore::new();
        core.apply(Ok(snapshot(vec![("a", json!({ "isRSVPed": true }))])));
        assert!(core.find("a").unwrap().is_rsvped);
        assert!(core.find("z").is_none());
    }

    #[tokio::test]
    async fn test_wait_until_ready() {
        let core = Arc::new(EventSyncCore::new());
        let waiter = {
            let core = core.clone();
            tokio::spawn(async move { core.wait_until_ready().await })
        };
        core.apply(Ok(snapshot(vec![])));
        assert!(waiter.await.unwrap().is_ok());
    }

    struct RefusingStore;

    #[async_trait::async_trait]
    impl EventStore for RefusingStore {
        fn subscribe(&self, _collection: &str, _listener: SnapshotListener) -> AppResult<Subscription> {
            Err(AppError::subscription("Firestore client is closed"))
        }

        async fn update_field(
            &self,
            _collection: &str,
            _id: &str,
            _field: &str,
            _value: serde_json::Value,
        ) -> AppResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_refused_subscribe_counts_as_first_error() {
        let core = EventSyncCore::new();
        assert!(core.activate(&RefusingStore, "events").is_err());
        assert_eq!(core.readiness(), Readiness::Ready);
        assert_eq!(
            core.last_error().as_deref(),
            Some("Subscription error: Firestore client is closed")
        );
        assert!(!core.is_active());
    }
}
