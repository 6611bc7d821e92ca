//! REST sink for PostgREST-style endpoints.
//!
//! Each table is exposed at `{base}/rest/v1/{table}`; rows are inserted by
//! POSTing a JSON array. The API key goes in both the `apikey` header and
//! bearer auth.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{Ack, EVENTS_TABLE, SESSIONS_TABLE, Sink, SinkError};
use crate::error::Result;
use crate::model::{Session, WireEvent};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RestSink {
    client: Client,
    base: Url,
    api_key: SecretString,
}

impl RestSink {
    pub fn new(mut base: Url, api_key: SecretString) -> Result<Self> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    /// Endpoint for a table.
    pub fn table_url(&self, table: &str) -> std::result::Result<Url, SinkError> {
        self.base
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| SinkError::Encoding(format!("bad table url: {e}")))
    }

    async fn insert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        rows: &T,
    ) -> std::result::Result<Ack, SinkError> {
        let key = self.api_key.expose_secret();
        let response = self
            .client
            .post(self.table_url(table)?)
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let inserted: Vec<serde_json::Value> = response.json().await?;
        metrics::sink_operations().add(1, &[KeyValue::new("operation", table.to_string())]);
        Ok(Ack {
            accepted: inserted.len(),
        })
    }
}

#[async_trait]
impl Sink for RestSink {
    async fn create_session(&self, session: &Session) -> std::result::Result<Ack, SinkError> {
        self.insert(SESSIONS_TABLE, std::slice::from_ref(session)).await
    }

    async fn send_batch(&self, events: &[WireEvent]) -> std::result::Result<Ack, SinkError> {
        if events.is_empty() {
            return Ok(Ack { accepted: 0 });
        }
        self.insert(EVENTS_TABLE, events).await
    }
}
