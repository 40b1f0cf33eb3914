//! In-process event store.
//!
//! Keeps documents ordered by id and re-delivers the full collection to
//! every live listener after each mutation, the way a real-time document
//! database does.

use super::{EventStore, SnapshotListener, Subscription};
use crate::error::{AppError, AppResult};
use crate::models::{Document, Snapshot};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// One field update accepted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub collection: String,
    pub id: String,
    pub field: String,
    pub value: Value,
}

struct Listener {
    collection: String,
    token: CancellationToken,
    callback: SnapshotListener,
}

#[derive(Default)]
struct MemoryInner {
    collections: HashMap<String, BTreeMap<String, Map<String, Value>>>,
    listeners: Vec<Listener>,
    updates: Vec<FieldUpdate>,
    fail_updates: Option<String>,
}

#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(collection: &str, documents: Vec<Document>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            let docs = inner.collections.entry(collection.to_string()).or_default();
            for document in documents {
                docs.insert(document.id, document.fields);
            }
        }
        store
    }

    /// Insert or replace a document and notify listeners.
    pub fn put(&self, collection: &str, document: Document) {
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(document.id, document.fields);
        Self::broadcast(&mut inner, collection);
    }

    /// Remove a document and notify listeners. Unknown ids are ignored.
    pub fn remove(&self, collection: &str, id: &str) {
        let mut inner = self.lock();
        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            Self::broadcast(&mut inner, collection);
        }
    }

    /// Make every following update fail with `reason` (or succeed again with
    /// `None`).
    pub fn fail_updates(&self, reason: Option<&str>) {
        self.lock().fail_updates = reason.map(str::to_string);
    }

    /// Deliver a subscription error to every listener of `collection`.
    pub fn emit_error(&self, collection: &str, message: &str) {
        let mut inner = self.lock();
        inner.listeners.retain(|l| !l.token.is_cancelled());
        for listener in inner.listeners.iter().filter(|l| l.collection == collection) {
            (listener.callback)(Err(AppError::subscription(message)));
        }
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        let inner = self.lock();
        Self::collect(&inner, collection)
    }

    pub fn updates(&self) -> Vec<FieldUpdate> {
        self.lock().updates.clone()
    }

    pub fn active_listeners(&self, collection: &str) -> usize {
        self.lock()
            .listeners
            .iter()
            .filter(|l| l.collection == collection && !l.token.is_cancelled())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn collect(inner: &MemoryInner, collection: &str) -> Vec<Document> {
        inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    // Listeners run under the store lock, so deliveries are never interleaved
    // and must not call back into the store.
    fn broadcast(inner: &mut MemoryInner, collection: &str) {
        inner.listeners.retain(|l| !l.token.is_cancelled());
        let documents = Self::collect(inner, collection);
        for listener in inner.listeners.iter().filter(|l| l.collection == collection) {
            (listener.callback)(Ok(Snapshot::new(documents.clone())));
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    fn subscribe(&self, collection: &str, listener: SnapshotListener) -> AppResult<Subscription> {
        let token = CancellationToken::new();
        let mut inner = self.lock();

        // Like a real-time listener, the current contents arrive immediately.
        let documents = Self::collect(&inner, collection);
        listener(Ok(Snapshot::new(documents)));

        inner.listeners.push(Listener {
            collection: collection.to_string(),
            token: token.clone(),
            callback: listener,
        });
        info!("Subscribed to in-memory collection '{}'", collection);

        Ok(Subscription::new(token))
    }

    async fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> AppResult<()> {
        let mut inner = self.lock();

        if let Some(reason) = inner.fail_updates.clone() {
            return Err(AppError::update(reason));
        }

        let fields = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| AppError::update(format!("No document to update: {}/{}", collection, id)))?;
        fields.insert(field.to_string(), value.clone());

        debug!("Updated {}/{} field '{}'", collection, id, field);
        inner.updates.push(FieldUpdate {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            value,
        });
        Self::broadcast(&mut inner, collection);
        Ok(())
    }
}
