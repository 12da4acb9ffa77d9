use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use std::fmt;


/// Kind literal for sensor records
pub const SENSOR_KIND: &str = "sensor";

/// Kind literal for actuator records
pub const ACTUATOR_KIND: &str = "actuador";

/// Record represents a single sensor reading or actuator state.
///
/// Sensors and actuators share one schema; `kind` tells them apart and
/// `value` holds whatever shape the device reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// UUIDv7 identifier assigned by the store (immutable)
    #[serde(rename = "_id")]
    pub id: String,

    /// Classification, conventionally "sensor" or "actuador"
    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Free-text label (not unique)
    #[serde(rename = "nombre", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "valor", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ReadingValue>,

    #[serde(rename = "unidad", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Creation time (defaults to insertion time)
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Case-insensitive kind comparison used for partitioning
    pub fn kind_matches(&self, kind: &str) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case(kind))
    }

    /// Case-insensitive substring match on the name
    pub fn name_contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&needle))
    }

    /// Replace every field present in `payload`; a present `null` clears it.
    /// The identifier never changes.
    pub fn apply(&mut self, payload: RecordPayload) {
        if let Some(kind) = payload.kind {
            self.kind = kind;
        }
        if let Some(name) = payload.name {
            self.name = name;
        }
        if let Some(value) = payload.value {
            self.value = value;
        }
        if let Some(unit) = payload.unit {
            self.unit = unit;
        }
        if let Some(timestamp) = payload.timestamp {
            self.timestamp = timestamp;
        }
    }
}

/// Partial or full record input (create, update, new-reading).
///
/// Every field is optional. The outer `Option` of the nullable fields says
/// whether the key was sent at all; `Some(None)` is an explicit `null`.
/// Unknown fields, including `_id`, are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(
        rename = "tipo",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<Option<String>>,

    #[serde(
        rename = "nombre",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<Option<String>>,

    #[serde(
        rename = "valor",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Option<ReadingValue>>,

    #[serde(
        rename = "unidad",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RecordPayload {
    /// Parse a request body. The body must be a JSON object.
    pub fn from_json(body: &[u8]) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| PayloadError::Malformed(e.to_string()))?;

        if !value.is_object() {
            return Err(PayloadError::NotObject);
        }

        serde_json::from_value(value).map_err(|e| PayloadError::Malformed(e.to_string()))
    }
}

/// Marks a key as present, keeping an explicit `null` as `Some(None)`.
/// Absent keys fall back to `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Reading value: numeric for sensors, state or text for actuators,
/// structured JSON for anything richer.
///
/// Numbers keep their JSON representation, so integers are not widened to
/// floats and values above 2^53 stay exact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Flag(bool),
    Number(Number),
    Text(String),
    Structured(Value),
}

/// Errors for request payloads
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadError {
    Malformed(String),
    NotObject,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Malformed(msg) => write!(f, "malformed record payload: {}", msg),
            PayloadError::NotObject => write!(f, "record payload must be a JSON object"),
        }
    }
}

impl std::error::Error for PayloadError {}

/// Search filter on kind, as accepted by `?tipo=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Sensors,
    Actuators,
}

impl KindFilter {
    /// Parse the query literal. Only the exact plural forms are accepted.
    pub fn parse(literal: &str) -> Option<Self> {
        match literal {
            "sensores" => Some(KindFilter::Sensors),
            "actuadores" => Some(KindFilter::Actuators),
            _ => None,
        }
    }

    /// Stored kind this filter selects
    pub fn kind(&self) -> &'static str {
        match self {
            KindFilter::Sensors => SENSOR_KIND,
            KindFilter::Actuators => ACTUATOR_KIND,
        }
    }
}
