//! Data-layer change notifications
//!
//! A notification names a data item by path, says how it changed, and carries
//! the item's attribute map. Attribute lookups are total: a missing or
//! mistyped attribute yields the caller's default.

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path of the data item the wearable publishes live vitals under
pub const LIVE_VITALS_PATH: &str = "/live_vitals";

/// How a data item changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Changed,
    Deleted,
    /// Any kind this relay does not act on
    #[serde(other)]
    Other,
}

/// Attribute map of a data item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataMap(Map<String, Value>);

impl DataMap {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value, which must be an object (or null for an empty map)
    pub fn from_value(value: Value) -> Result<Self, RelayError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(RelayError::MalformedNotification(format!(
                "attributes must be an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Integer attribute, or `default` when missing, not an integer, or
    /// outside the `i32` range.
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.0
            .get(key)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single change delivered by the data layer
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    /// Data item path (e.g. "/live_vitals")
    pub path: String,
    pub kind: ChangeKind,
    pub attributes: DataMap,
}

impl ChangeNotification {
    pub fn new(path: &str, kind: ChangeKind, attributes: DataMap) -> Self {
        Self {
            path: path.to_string(),
            kind,
            attributes,
        }
    }

    /// Build a notification from a data item URI such as
    /// `wear://node-1/live_vitals`.
    pub fn from_uri(uri: &str, kind: ChangeKind, attributes: DataMap) -> Self {
        Self {
            path: uri_path(uri).to_string(),
            kind,
            attributes,
        }
    }

    /// Decode a notification from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        let raw: RawNotification = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// True when this is a change to the given path
    pub fn is_change_to(&self, path: &str) -> bool {
        self.kind == ChangeKind::Changed && self.path == path
    }
}

/// JSON wire form of a notification.
///
/// Either `path` or `uri` names the item; `path` wins when both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub kind: ChangeKind,
    #[serde(default)]
    pub attributes: Value,
}

impl TryFrom<RawNotification> for ChangeNotification {
    type Error = RelayError;

    fn try_from(raw: RawNotification) -> Result<Self, Self::Error> {
        let attributes = DataMap::from_value(raw.attributes)?;

        match (raw.path, raw.uri) {
            (Some(path), _) => Ok(Self::new(&path, raw.kind, attributes)),
            (None, Some(uri)) => Ok(Self::from_uri(&uri, raw.kind, attributes)),
            (None, None) => Err(RelayError::MalformedNotification(
                "notification has neither path nor uri".to_string(),
            )),
        }
    }
}

/// Path component of a data item URI. A bare path is returned as is.
fn uri_path(uri: &str) -> &str {
    let without_query = uri.split(['?', '#']).next().unwrap_or(uri);

    match without_query.split_once("://") {
        Some((_, rest)) => match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "/",
        },
        None => without_query,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
