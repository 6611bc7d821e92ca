//! Session identity: one opaque id per running process.

use chrono::Utc;

use crate::environment::Environment;
use crate::model::{Session, SessionId};

/// Holds the process-lifetime session id and builds the session descriptor.
#[derive(Debug, Clone, Default)]
pub struct SessionIdentity {
    id: SessionId,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self { id: SessionId::new() }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Capture the session descriptor from the current environment.
    pub fn create_session(&self, env: &dyn Environment) -> Session {
        let snapshot = env.snapshot();
        Session {
            session_id: self.id.clone(),
            start_time: Utc::now(),
            user_agent: snapshot.user_agent,
            screen_size: snapshot.screen_size,
            language: snapshot.language,
            referrer: snapshot.referrer,
            platform: snapshot.platform,
        }
    }
}
