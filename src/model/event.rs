//! Event types: the enriched in-memory event and its wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SessionId;

/// Coarse load/render timings of the host, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTiming {
    pub load_time: Option<i64>,
    pub render_time: Option<i64>,
}

/// Event payload: the enrichment defaults with caller properties merged on
/// top. Keys are camelCase because the sink stores this object verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(pub Map<String, Value>);

/// An enriched event sitting in the queue. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub event_data: EventData,
    pub session_id: SessionId,
    #[serde(with = "super::iso8601_serde")]
    pub client_timestamp: DateTime<Utc>,
}

/// The shape a sink receives: one row of the `user_analytics` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event_type: String,
    pub event_data: Value,
    pub session_id: String,
    pub client_timestamp: String,
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        Self {
            event_type: event.event_type.clone(),
            event_data: Value::Object(event.event_data.0.clone()),
            session_id: event.session_id.0.clone(),
            client_timestamp: super::iso8601(&event.client_timestamp),
        }
    }
}
