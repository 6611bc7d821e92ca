//! Core data model.
//!
//! A session describes one running host process. An event is one discrete
//! thing that happened in it, enriched with context and stamped with the
//! owning session's id so the sink never needs a join.

pub mod event;
pub mod session;

pub use event::{Event, EventData, PerformanceTiming, WireEvent};
pub use session::{Session, SessionId};

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp as ISO-8601 UTC with millisecond precision
/// (`2024-05-01T12:30:00.123Z`).
pub fn iso8601(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter that writes `DateTime<Utc>` through [`iso8601`].
pub(crate) mod iso8601_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::iso8601(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(d)
    }
}
