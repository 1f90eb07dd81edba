//! Audit log entries.
//!
//! The upstream schema varies per event type, so an [`Entry`] is an open
//! property bag with named accessors for the few fields the engine itself
//! inspects.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Result, SyncError};

/// Field carrying the upstream document id.
pub const DOCUMENT_ID_FIELD: &str = "_document_id";

/// Timestamp fields, in priority order.
const TIMESTAMP_FIELDS: [&str; 2] = ["@timestamp", "timestamp"];

/// One audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entry {
    fields: BTreeMap<String, Value>,
}

impl Entry {
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Build an entry from a decoded JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                fields: map.into_iter().collect(),
            }),
            other => Err(SyncError::MalformedResponse(format!(
                "audit log entry must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Stable identity: the upstream document id when present, otherwise
    /// the content hash.
    pub fn identity(&self) -> String {
        match self.fields.get(DOCUMENT_ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => self.content_hash(),
            Some(other) => other.to_string(),
        }
    }

    /// SHA-256 over the canonical JSON form of every field, keys sorted at
    /// every nesting level.
    pub fn content_hash(&self) -> String {
        let canonical: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), canonicalize(v)))
            .collect();
        let bytes = serde_json::to_vec(&Value::Object(canonical)).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// Raw occurrence timestamp. `@timestamp` wins over `timestamp` when both
    /// are populated.
    pub fn occurred_at(&self) -> Option<&Value> {
        TIMESTAMP_FIELDS
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .find(|v| is_populated(v))
    }

    /// Occurrence time, reading numbers as epoch milliseconds and strings as
    /// either epoch milliseconds or RFC 3339.
    pub fn occurred_at_utc(&self) -> Option<DateTime<Utc>> {
        match self.occurred_at()? {
            Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
            Value::String(s) => match s.parse::<i64>() {
                Ok(ms) => DateTime::from_timestamp_millis(ms),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            },
            _ => None,
        }
    }

    pub fn action(&self) -> Option<&str> {
        self.fields.get("action").and_then(Value::as_str)
    }

    pub fn actor(&self) -> Option<&str> {
        self.fields.get("actor").and_then(Value::as_str)
    }

    /// Flat `key=value ` rendering handed to the sink. Strings are written
    /// unquoted and unescaped, every pair is followed by one space.
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push('=');
            out.push_str(&render_value(value));
            out.push(' ');
        }
        out
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self.occurred_at().map(render_value).unwrap_or_default();
        write!(f, "{} - {}", ts, self.action().unwrap_or_default())
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
