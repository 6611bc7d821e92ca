//! In-process sink that records everything it receives.
//!
//! Used by tests and dry runs. Failures and latency are scriptable so
//! retry and in-flight behaviour can be exercised without a network.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{Ack, Sink, SinkError};
use crate::model::{Session, WireEvent};

#[derive(Debug, Default)]
struct MemoryState {
    sessions: Vec<Session>,
    attempts: Vec<Vec<WireEvent>>,
    delivered: Vec<Vec<WireEvent>>,
    fail_next: usize,
    failing: bool,
    fail_sessions: bool,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `n` batches, then succeed.
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Fail every batch until turned off.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn fail_sessions(&self, failing: bool) {
        self.lock().fail_sessions = failing;
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().sessions.clone()
    }

    /// Every batch handed to the sink, successful or not, in call order.
    pub fn attempts(&self) -> Vec<Vec<WireEvent>> {
        self.lock().attempts.clone()
    }

    /// Batches that were accepted, in call order.
    pub fn batches(&self) -> Vec<Vec<WireEvent>> {
        self.lock().delivered.clone()
    }

    /// Accepted events, flattened in delivery order.
    pub fn delivered(&self) -> Vec<WireEvent> {
        self.lock().delivered.iter().flatten().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn create_session(&self, session: &Session) -> Result<Ack, SinkError> {
        self.pause().await;
        let mut state = self.lock();
        if state.fail_sessions {
            return Err(SinkError::Unavailable("session insert refused".to_string()));
        }
        state.sessions.push(session.clone());
        Ok(Ack { accepted: 1 })
    }

    async fn send_batch(&self, events: &[WireEvent]) -> Result<Ack, SinkError> {
        self.lock().attempts.push(events.to_vec());
        self.pause().await;

        let mut state = self.lock();
        if state.failing {
            return Err(SinkError::Transport("sink offline".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(SinkError::Transport("injected failure".to_string()));
        }
        state.delivered.push(events.to_vec());
        Ok(Ack {
            accepted: events.len(),
        })
    }
}
