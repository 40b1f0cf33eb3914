// file: src/models/event.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire name of the RSVP flag inside a stored document.
pub const RSVP_FIELD: &str = "isRSVPed";

/// A raw document as delivered by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a document from a JSON object literal. Non-object values yield an
    /// empty field set.
    pub fn from_json(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "isRSVPed", default)]
    pub is_rsvped: bool,
}

impl EventRecord {
    /// Normalize a stored document into a record.
    ///
    /// Never fails: text fields that hold something other than text are
    /// rendered or dropped, and the RSVP flag is `true` only for a boolean
    /// `true`.
    pub fn from_document(document: &Document) -> Self {
        let fields = &document.fields;
        Self {
            id: document.id.clone(),
            name: text_field(fields, "name"),
            category: text_field(fields, "category"),
            date: text_field(fields, "date"),
            location: text_field(fields, "location"),
            description: text_field(fields, "description"),
            image: text_field(fields, "image"),
            is_rsvped: matches!(fields.get(RSVP_FIELD), Some(Value::Bool(true))),
        }
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.category.as_deref() == Some(category)
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("Untitled event")
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
