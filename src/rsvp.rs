//! RSVP toggling.
//!
//! The updater never touches the local list: the store's next snapshot is the
//! only way a new RSVP value becomes visible.

use crate::error::{AppError, AppResult};
use crate::models::{Notice, RSVP_FIELD};
use crate::store::EventStore;
use crate::sync::EventSyncCore;
use log::{error, info};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsvpOutcome {
    /// The store accepted the new flag.
    Updated { id: String, is_rsvped: bool },
    /// The event is not in the current list; nothing was sent.
    NotFound { id: String },
}

impl RsvpOutcome {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            RsvpOutcome::Updated { is_rsvped: true, .. } => {
                Some(Notice::new("RSVP Status", "You are now RSVPed!"))
            }
            RsvpOutcome::Updated { is_rsvped: false, .. } => {
                Some(Notice::new("RSVP Status", "You have un-RSVPed."))
            }
            RsvpOutcome::NotFound { .. } => None,
        }
    }
}

pub struct RsvpUpdater {
    store: Arc<dyn EventStore>,
    core: Arc<EventSyncCore>,
    collection: String,
}

impl RsvpUpdater {
    pub fn new(store: Arc<dyn EventStore>, core: Arc<EventSyncCore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            core,
            collection: collection.into(),
        }
    }

    pub async fn toggle_rsvp(&self, id: &str) -> AppResult<RsvpOutcome> {
        let Some(event) = self.core.find(id) else {
            info!("RSVP toggle for unknown event '{}' ignored", id);
            return Ok(RsvpOutcome::NotFound { id: id.to_string() });
        };

        let is_rsvped = !event.is_rsvped;
        self.store
            .update_field(&self.collection, id, RSVP_FIELD, Value::Bool(is_rsvped))
            .await
            .map_err(|e| {
                error!("Error updating RSVP status for '{}': {}", id, e);
                match e {
                    AppError::Update(_) => e,
                    other => AppError::update(other.to_safe_string()),
                }
            })?;

        info!("RSVP for '{}' set to {}", id, is_rsvped);
        Ok(RsvpOutcome::Updated {
            id: id.to_string(),
            is_rsvped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, Snapshot};
    use crate::store::{SnapshotListener, Subscription};
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use serde_json::json;

    mock! {
        pub Store {}

        #[async_trait]
        impl EventStore for Store {
            fn subscribe(&self, collection: &str, listener: SnapshotListener) -> AppResult<Subscription>;
            async fn update_field(
                &self,
                collection: &str,
                id: &str,
                field: &str,
                value: Value,
            ) -> AppResult<()>;
        }
    }

    fn core_with(docs: Vec<Document>) -> Arc<EventSyncCore> {
        let core = Arc::new(EventSyncCore::new());
        core.apply(Ok(Snapshot::new(docs)));
        core
    }

    #[tokio::test]
    async fn test_toggle_sends_negated_flag() {
        let core = core_with(vec![Document::from_json("b", json!({ "category": "Tech" }))]);
        let mut store = MockStore::new();
        store
            .expect_update_field()
            .with(eq("events"), eq("b"), eq("isRSVPed"), eq(json!(true)))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let updater = RsvpUpdater::new(Arc::new(store), core.clone(), "events");
        let outcome = updater.toggle_rsvp("b").await.unwrap();

        assert_eq!(
            outcome,
            RsvpOutcome::Updated { id: "b".to_string(), is_rsvped: true }
        );
        assert_eq!(outcome.notice().unwrap().message, "You are now RSVPed!");
        // no local flip: the list still shows the pre-toggle value
        assert!(!core.find("b").unwrap().is_rsvped);
    }

    #[tokio::test]
    async fn test_toggle_unknown_id_is_noop() {
        let core = core_with(vec![]);
        let mut store = MockStore::new();
        store.expect_update_field().never();

        let updater = RsvpUpdater::new(Arc::new(store), core, "events");
        let outcome = updater.toggle_rsvp("ghost").await.unwrap();
        assert_eq!(outcome, RsvpOutcome::NotFound { id: "ghost".to_string() });
        assert!(outcome.notice().is_none());
    }

    #[tokio::test]
    async fn test_failed_update_is_reported_once() {
        let core = core_with(vec![Document::from_json("a", json!({ "isRSVPed": true }))]);
        let mut store = MockStore::new();
        store
            .expect_update_field()
            .times(1)
            .returning(|_, _, _, _| Err(AppError::config("unreachable")));

        let updater = RsvpUpdater::new(Arc::new(store), core.clone(), "events");
        let err = updater.toggle_rsvp("a").await.unwrap_err();

        assert!(matches!(err, AppError::Update(_)));
        assert_eq!(err.notice().message, "Failed to update RSVP status.");
        assert!(core.find("a").unwrap().is_rsvped);
    }
}
