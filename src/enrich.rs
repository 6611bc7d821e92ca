//! Context enrichment: turns caller properties into a complete event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::environment::Environment;
use crate::model::{Event, EventData, SessionId, iso8601};

/// Arbitrary caller-supplied event properties.
pub type Properties = Map<String, Value>;

/// Merges session id, timestamp, location, viewport and timings into
/// caller properties. Caller keys win on collision.
#[derive(Clone)]
pub struct ContextEnricher {
    session_id: SessionId,
    env: Arc<dyn Environment>,
}

impl ContextEnricher {
    pub fn new(session_id: SessionId, env: Arc<dyn Environment>) -> Self {
        Self { session_id, env }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn environment(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    /// Build event data stamped with the current time.
    pub fn enrich(&self, props: Option<Properties>) -> EventData {
        self.enrich_at(Utc::now(), props)
    }

    /// Build event data stamped with `now`.
    pub fn enrich_at(&self, now: DateTime<Utc>, props: Option<Properties>) -> EventData {
        let snapshot = self.env.snapshot();

        let mut data = Map::new();
        data.insert("sessionId".into(), json!(self.session_id.as_str()));
        data.insert("timestamp".into(), json!(iso8601(&now)));
        data.insert("path".into(), json!(snapshot.path));
        data.insert("viewportSize".into(), json!(snapshot.viewport_size));
        data.insert(
            "performance".into(),
            json!({
                "loadTime": snapshot.performance.load_time,
                "renderTime": snapshot.performance.render_time,
            }),
        );

        if let Some(props) = props {
            data.extend(props);
        }
        EventData(data)
    }

    /// Build a full event. `event_data.timestamp` and `client_timestamp`
    /// come from the same instant.
    pub fn event(&self, event_type: impl Into<String>, props: Option<Properties>) -> Event {
        let now = Utc::now();
        Event {
            event_type: event_type.into(),
            event_data: self.enrich_at(now, props),
            session_id: self.session_id.clone(),
            client_timestamp: now,
        }
    }
}

impl std::fmt::Debug for ContextEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextEnricher")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
