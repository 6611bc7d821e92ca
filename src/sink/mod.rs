//! Remote sink adapters.
//!
//! A sink durably stores sessions and event batches. Every adapter
//! normalizes its failures into [`SinkError`] so the flush path has a
//! single error branch.

pub mod memory;
pub mod postgres;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::SinkConfig;
use crate::config::secrets::ExposeSecret;
use crate::model::{Session, WireEvent};

pub use memory::MemorySink;
pub use postgres::PgSink;
pub use rest::RestSink;

/// Table holding one row per session.
pub const SESSIONS_TABLE: &str = "user_sessions";
/// Table holding one row per event.
pub const EVENTS_TABLE: &str = "user_analytics";

/// Acknowledgement returned by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Rows the sink reports as stored.
    pub accepted: usize,
}

/// Normalized sink failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("sink rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("encoding failure: {0}")]
    Encoding(String),
}

impl From<sqlx::Error> for SinkError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            other @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                SinkError::Unavailable(other.to_string())
            }
            sqlx::Error::Database(db) => SinkError::Rejected {
                status: 0,
                message: db.message().to_string(),
            },
            other => SinkError::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() || e.is_body() || e.is_decode() {
            SinkError::Encoding(e.to_string())
        } else {
            SinkError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Encoding(e.to_string())
    }
}

/// Contract the pipeline requires from a remote store.
///
/// `send_batch` may be called again with the same events after a failure;
/// duplicates at the sink are accepted.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<Ack, SinkError>;

    async fn send_batch(&self, events: &[WireEvent]) -> Result<Ack, SinkError>;
}

/// Build the configured sink.
pub async fn connect(config: &SinkConfig) -> crate::error::Result<Arc<dyn Sink>> {
    debug!(sink = config.kind(), "connecting analytics sink");
    let sink: Arc<dyn Sink> = match config {
        SinkConfig::Postgres { url } => Arc::new(PgSink::connect(url.expose_secret()).await?),
        SinkConfig::Rest { url, api_key } => Arc::new(RestSink::new(url.clone(), api_key.clone())?),
    };
    Ok(sink)
}
