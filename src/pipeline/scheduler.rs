//! Task scheduling seam.
//!
//! Timers and fire-and-forget flushes go through [`Scheduler`] so hosts can
//! choose the runtime and tests can observe or drive them.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::error::{Error, Result};

/// A unit of deferred work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs tasks now or after a delay.
///
/// Implementations must never run a task inline: callers may hold internal
/// locks while scheduling.
pub trait Scheduler: Send + Sync {
    /// Run `task` in the background. Its result is never observed.
    fn spawn(&self, task: Task);

    /// Run `task` once after `delay` unless the returned handle is cancelled
    /// first.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Cancellation handle for a scheduled task. Dropping it does not cancel.
#[derive(Debug)]
pub struct TimerHandle {
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// Cancel the task if it has not started yet.
    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Fails when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Other(format!("no tokio runtime: {e}")))
    }
}

impl Scheduler for TokioScheduler {
    fn spawn(&self, task: Task) {
        self.handle.spawn(task);
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        // Only the sleep is abortable: once the delay elapses the task runs
        // on its own so a late cancel cannot interrupt it half-way.
        let runtime = self.handle.clone();
        let timer = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            runtime.spawn(task);
        });
        TimerHandle::new(timer.abort_handle())
    }
}
