//! Remote event store boundary.
//!
//! A store pushes full-collection snapshots to a listener for as long as the
//! returned [`Subscription`] is alive, and applies single-field updates to
//! one document at a time.

use crate::error::{AppError, AppResult};
use crate::models::Snapshot;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreClient;
pub use memory::MemoryEventStore;

/// Default collection holding the event documents.
pub const EVENTS_COLLECTION: &str = "events";

/// Receives every snapshot (or subscription error) in delivery order.
pub type SnapshotListener = Arc<dyn Fn(Result<Snapshot, AppError>) + Send + Sync>;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Start pushing snapshots of `collection` to `listener`.
    fn subscribe(&self, collection: &str, listener: SnapshotListener) -> AppResult<Subscription>;

    /// Set `field` of document `id` to `value`. A missing document is an error.
    async fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> AppResult<()>;
}

/// Handle to a live subscription. Delivery stops once it is unsubscribed or
/// dropped.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            log::debug!("Tearing down event subscription");
            self.token.cancel();
        }
    }
}
