//! Postgres sink via direct SQLx.
//!
//! Writes sessions to `user_sessions` and events to `user_analytics`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{Ack, EVENTS_TABLE, SESSIONS_TABLE, Sink, SinkError};
use crate::error::{Error, Result};
use crate::model::{Session, WireEvent};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// Postgres-backed sink. Owns its connection pool.
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    /// Connect to Postgres and create a small connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Run `SELECT 1` against the pool.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Count stored events for a session.
    pub async fn count_events(&self, session_id: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {EVENTS_TABLE} WHERE session_id = $1"
        ))
        .bind(session_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row.0)
    }
}

#[async_trait]
impl Sink for PgSink {
    async fn create_session(&self, session: &Session) -> std::result::Result<Ack, SinkError> {
        let rows = sqlx::query(&format!(
            "INSERT INTO {SESSIONS_TABLE} (session_id, start_time, user_agent, screen_size, language, referrer, platform)
             VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(session.session_id.as_str())
        .bind(session.start_time)
        .bind(&session.user_agent)
        .bind(&session.screen_size)
        .bind(&session.language)
        .bind(&session.referrer)
        .bind(&session.platform)
        .execute(&self.pool)
        .await?
        .rows_affected();

        metrics::sink_operations().add(1, &[KeyValue::new("operation", "create_session")]);
        Ok(Ack {
            accepted: rows as usize,
        })
    }

    async fn send_batch(&self, events: &[WireEvent]) -> std::result::Result<Ack, SinkError> {
        if events.is_empty() {
            return Ok(Ack { accepted: 0 });
        }

        let timestamps = events
            .iter()
            .map(|e| {
                DateTime::parse_from_rfc3339(&e.client_timestamp)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|err| {
                        SinkError::Encoding(format!(
                            "bad client_timestamp {:?}: {err}",
                            e.client_timestamp
                        ))
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {EVENTS_TABLE} (event_type, event_data, session_id, client_timestamp) "
        ));
        qb.push_values(events.iter().zip(timestamps), |mut row, (event, ts)| {
            row.push_bind(&event.event_type)
                .push_bind(&event.event_data)
                .push_bind(&event.session_id)
                .push_bind(ts);
        });

        let rows = qb.build().execute(&self.pool).await?.rows_affected();

        metrics::sink_operations().add(1, &[KeyValue::new("operation", "send_batch")]);
        Ok(Ack {
            accepted: rows as usize,
        })
    }
}
