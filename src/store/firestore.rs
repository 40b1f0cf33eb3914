//! Firestore REST implementation of [`EventStore`].
//!
//! The real-time listener is emulated by polling: the whole collection is
//! listed every poll interval and a snapshot is delivered only when the
//! document set differs from the last one delivered.

use super::{EventStore, SnapshotListener, Subscription};
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::models::{Document, Snapshot};
use crate::utils::retry::{retry_with_exponential_backoff, RetryConfig};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    pub page_size: u32,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            api_key: None,
            poll_interval: Duration::from_secs(5),
            page_size: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RestDocument {
    fn into_document(self) -> Document {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or(self.name.as_str())
            .to_string();
        Document::new(id, decode_fields(&self.fields))
    }
}

/// Stateless request side of the client, cloned into each polling task.
#[derive(Clone)]
struct FirestoreApi {
    listen_http: Client,
    write_http: Client,
    config: FirestoreConfig,
    retry: RetryConfig,
}

impl FirestoreApi {
    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id
        )
    }

    fn url_for(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.documents_root())
            .map_err(|e| AppError::config(format!("Invalid Firestore base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::config("Firestore base URL cannot carry a path"))?
            .extend(segments);
        if let Some(key) = &self.config.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    async fn list_page(&self, collection: &str, page_token: Option<&str>) -> AppResult<ListDocumentsResponse> {
        let mut url = self.url_for(&[collection])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &self.config.page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self.listen_http.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(AppError::subscription(format!("HTTP {}: {}", status, text)));
        }

        Ok(response.json::<ListDocumentsResponse>().await?)
    }

    /// List every document of `collection`, following page tokens.
    async fn fetch_collection(&self, collection: &str) -> AppResult<Vec<Document>> {
        let started = Instant::now();
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(collection, page_token.as_deref()).await?;
            documents.extend(page.documents.into_iter().map(RestDocument::into_document));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        crate::utils::logging::log_store_operation(
            "list",
            collection,
            started.elapsed().as_millis() as u64,
        );
        Ok(documents)
    }

    async fn fetch_with_retry(&self, collection: &str) -> AppResult<Vec<Document>> {
        retry_with_exponential_backoff(&self.retry, || self.fetch_collection(collection)).await
    }

    async fn patch_field(&self, collection: &str, id: &str, field: &str, value: &Value) -> AppResult<()> {
        let mut url = self.url_for(&[collection, id])?;
        url.query_pairs_mut()
            .append_pair("updateMask.fieldPaths", field)
            .append_pair("currentDocument.exists", "true");

        let mut fields = Map::new();
        fields.insert(field.to_string(), encode_value(value));
        let body = json!({ "fields": fields });

        let response = self
            .write_http
            .patch(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::update(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(AppError::update(format!(
                "No document to update: {}/{}",
                collection, id
            ))),
            // currentDocument.exists=true on a missing document
            StatusCode::BAD_REQUEST if text.contains("FAILED_PRECONDITION") => Err(
                AppError::update(format!("No document to update: {}/{}", collection, id)),
            ),
            _ => Err(AppError::update(format!("HTTP {}: {}", status, text))),
        }
    }
}

/// Firestore client with an explicit open/close lifecycle.
///
/// Every subscription runs on a child of the client's root token, so
/// [`FirestoreClient::close`] tears all of them down.
pub struct FirestoreClient {
    api: FirestoreApi,
    root: CancellationToken,
}

impl FirestoreClient {
    pub fn open(config: FirestoreConfig) -> AppResult<Self> {
        if config.project_id.trim().is_empty() {
            return Err(AppError::config("Firestore project id is required"));
        }
        if config.poll_interval.is_zero() {
            return Err(AppError::config("Poll interval must be greater than zero"));
        }

        let listen = HttpConfig::firestore_listen();
        let api = FirestoreApi {
            listen_http: listen.build_client()?,
            write_http: HttpConfig::firestore_write().build_client()?,
            retry: listen.to_retry_config(),
            config,
        };
        // Fail on a bad base URL now rather than on the first poll.
        api.url_for(&[])?;

        info!("Opened Firestore client for project '{}'", api.config.project_id);
        Ok(Self {
            api,
            root: CancellationToken::new(),
        })
    }

    pub fn is_open(&self) -> bool {
        !self.root.is_cancelled()
    }

    pub fn close(&self) {
        if self.is_open() {
            info!("Closing Firestore client for project '{}'", self.api.config.project_id);
            self.root.cancel();
        }
    }

    /// One-off read of the whole collection.
    pub async fn fetch_collection(&self, collection: &str) -> AppResult<Vec<Document>> {
        self.api.fetch_collection(collection).await
    }
}

impl Drop for FirestoreClient {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[async_trait]
impl EventStore for FirestoreClient {
    fn subscribe(&self, collection: &str, listener: SnapshotListener) -> AppResult<Subscription> {
        if !self.is_open() {
            return Err(AppError::subscription("Firestore client is closed"));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AppError::subscription("Subscriptions need a running tokio runtime"))?;

        let token = self.root.child_token();
        runtime.spawn(poll_collection(
            self.api.clone(),
            collection.to_string(),
            listener,
            token.clone(),
        ));
        info!(
            "Listening to collection '{}' every {:?}",
            collection, self.api.config.poll_interval
        );

        Ok(Subscription::new(token))
    }

    async fn update_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> AppResult<()> {
        if !self.is_open() {
            return Err(AppError::update("Firestore client is closed"));
        }
        let started = Instant::now();
        self.api.patch_field(collection, id, field, &value).await?;
        crate::utils::logging::log_store_operation(
            "update",
            collection,
            started.elapsed().as_millis() as u64,
        );
        Ok(())
    }
}

async fn poll_collection(
    api: FirestoreApi,
    collection: String,
    listener: SnapshotListener,
    token: CancellationToken,
) {
    let mut last_delivered: Option<Vec<Document>> = None;
    let mut failing = false;

    loop {
        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = api.fetch_with_retry(&collection) => result,
        };
        if token.is_cancelled() {
            break;
        }

        match result {
            Ok(documents) => {
                if failing {
                    info!("Listener for '{}' recovered", collection);
                    failing = false;
                }
                if last_delivered.as_ref() != Some(&documents) {
                    debug!("Collection '{}' changed, delivering {} documents", collection, documents.len());
                    listener(Ok(Snapshot::new(documents.clone())));
                    last_delivered = Some(documents);
                }
            }
            Err(e) => {
                warn!("Polling collection '{}' failed: {}", collection, e);
                // Only the transition into failure is reported.
                if !failing {
                    listener(Err(e.to_subscription()));
                    failing = true;
                    // The first good poll after recovery is always delivered.
                    last_delivered = None;
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(api.config.poll_interval) => {}
            _ = token.cancelled() => break,
        }
    }

    info!("Listener for collection '{}' stopped", collection);
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, typed)| (key.clone(), decode_value(typed)))
        .collect()
}

/// Convert a Firestore typed value (`{"stringValue": "x"}`) into plain JSON.
pub fn decode_value(typed: &Value) -> Value {
    let Some((kind, inner)) = typed.as_object().and_then(|obj| obj.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        },
        "doubleValue" => inner
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        "geoPointValue" => inner.clone(),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        other => {
            debug!("Ignoring unsupported Firestore value type '{}'", other);
            Value::Null
        }
    }
}

/// Convert plain JSON into a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(key, value)| (key.clone(), encode_value(value)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}
