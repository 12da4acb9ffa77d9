use crate::record::RecordPayload;
use serde::Deserialize;

/// Client → Server message types
///
/// Frames share the outbound envelope: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// A reading pushed straight over the socket; stored like an HTTP create
    #[serde(rename = "new-reading")]
    NewReading(RecordPayload),
}
