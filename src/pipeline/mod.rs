//! Event queue and flush controller.
//!
//! Decides when the queue is drained (size threshold, interval timer,
//! high-priority events, teardown) and guarantees at most one flush in
//! flight. Failed batches return to the head of the queue and are retried
//! with exponential backoff.

pub mod queue;
pub mod retry;
pub mod scheduler;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::FutureExt;
use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tracing::{Instrument, debug, error, warn};

use crate::model::{Event, WireEvent};
use crate::sink::{Sink, SinkError};
use crate::telemetry::flush::{record_flush_result, start_flush_span};
use crate::telemetry::metrics;

pub use queue::EventQueue;
pub use retry::RetryPolicy;
pub use scheduler::{Scheduler, Task, TimerHandle, TokioScheduler};

/// Flush as soon as this many events are queued.
pub const BATCH_SIZE: usize = 10;
/// Flush pending events at most this long after the first one is queued.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(10_000);
/// Consecutive automatic retries before giving up on self-scheduling.
pub const MAX_RETRIES: u32 = 3;
/// Backoff base; retry `n` waits `INITIAL_RETRY_DELAY * 2^n`.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Event types containing this marker are flushed immediately.
pub const FORM_SUBMISSION_MARKER: &str = "form_submission";
/// Event type of page views, also flushed immediately.
pub const PAGE_VIEW: &str = "page_view";

/// Batching and retry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            flush_interval: FLUSH_INTERVAL,
            max_retries: MAX_RETRIES,
            initial_retry_delay: INITIAL_RETRY_DELAY,
        }
    }
}

impl PipelineConfig {
    /// Copy with `batch_size` raised to at least one.
    pub fn normalized(mut self) -> Self {
        if self.batch_size == 0 {
            warn!("batch_size of 0 is not usable, using 1");
            self.batch_size = 1;
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: self.initial_retry_delay,
            max_retries: self.max_retries,
        }
    }
}

/// Whether an event type bypasses batching.
pub fn is_high_priority(event_type: &str) -> bool {
    event_type == PAGE_VIEW || event_type.contains(FORM_SUBMISSION_MARKER)
}

/// Why a flush did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Disabled,
    InFlight,
}

/// Result of a single flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Skipped(SkipReason),
    Delivered {
        count: usize,
    },
    /// The batch went back to the head of the queue. `retry_in` is `None`
    /// once automatic retries are exhausted.
    Failed {
        count: usize,
        retry_in: Option<Duration>,
    },
}

#[derive(Debug, Default)]
struct FlushState {
    queue: EventQueue,
    in_flight: bool,
    retry_count: u32,
    /// Pending interval timer, tagged with its sequence number.
    timer: Option<(u64, TimerHandle)>,
    timer_seq: u64,
}

/// The queue plus its flush machinery. One instance per session.
pub struct Pipeline {
    sink: Arc<dyn Sink>,
    scheduler: Arc<dyn Scheduler>,
    config: PipelineConfig,
    retry: RetryPolicy,
    state: Mutex<FlushState>,
    /// Woken whenever the in-flight slot is released.
    idle: Notify,
}

impl Pipeline {
    pub fn new(
        sink: Arc<dyn Sink>,
        scheduler: Arc<dyn Scheduler>,
        config: PipelineConfig,
    ) -> Arc<Self> {
        let config = config.normalized();
        Arc::new(Self {
            sink,
            scheduler,
            retry: config.retry_policy(),
            config,
            state: Mutex::new(FlushState::default()),
            idle: Notify::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Snapshot of queued events, head first.
    pub fn queued(&self) -> Vec<Event> {
        self.lock().queue.iter().cloned().collect()
    }

    pub fn is_flushing(&self) -> bool {
        self.lock().in_flight
    }

    pub fn retry_count(&self) -> u32 {
        self.lock().retry_count
    }

    pub fn has_pending_timer(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// Wait until no flush is in flight.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.idle.notified();
            if !self.is_flushing() {
                return;
            }
            released.await;
        }
    }

    /// Append an event and apply the flush triggers.
    pub fn enqueue(self: &Arc<Self>, event: Event) {
        let high_priority = is_high_priority(&event.event_type);
        let batch_full = {
            let mut state = self.lock();
            state.queue.push(event);
            if state.queue.len() >= self.config.batch_size {
                true
            } else {
                self.arm_timer(&mut state);
                false
            }
        };

        if batch_full || high_priority {
            self.trigger_flush();
        }
    }

    /// Start a flush without waiting for it.
    pub fn trigger_flush(self: &Arc<Self>) {
        if let Ok(batch) = self.begin_flush() {
            let pipeline = Arc::clone(self);
            self.scheduler.spawn(Box::pin(async move {
                pipeline.complete_flush(batch).await;
            }));
        }
    }

    /// Deliver one batch and wait for the outcome.
    pub async fn flush(self: &Arc<Self>) -> FlushOutcome {
        match self.begin_flush() {
            Ok(batch) => self.complete_flush(batch).await,
            Err(reason) => FlushOutcome::Skipped(reason),
        }
    }

    /// Teardown: cancel the interval timer and fire one last flush.
    pub fn teardown(self: &Arc<Self>) {
        if let Some((_, timer)) = self.lock().timer.take() {
            timer.cancel();
        }
        debug!(queued = self.queued_len(), "teardown flush");
        self.trigger_flush();
    }

    /// Synchronous half of a flush: check, claim the in-flight slot and
    /// take the batch, all under one lock.
    fn begin_flush(&self) -> Result<Vec<Event>, SkipReason> {
        let mut state = self.lock();
        if state.queue.is_empty() {
            return Err(SkipReason::Empty);
        }
        if state.in_flight {
            return Err(SkipReason::InFlight);
        }

        if let Some((_, timer)) = state.timer.take() {
            timer.cancel();
        }
        state.in_flight = true;
        Ok(state.queue.take_prefix(self.config.batch_size))
    }

    async fn complete_flush(self: &Arc<Self>, batch: Vec<Event>) -> FlushOutcome {
        let count = batch.len();
        let span = start_flush_span(count, self.retry_count());
        let wire: Vec<WireEvent> = batch.iter().map(WireEvent::from).collect();
        let guard = InFlight {
            pipeline: &**self,
            batch: Some(batch),
        };

        debug!(parent: &span, events = ?wire, "flushing events");
        let started = Instant::now();
        let result = AssertUnwindSafe(self.sink.send_batch(&wire))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|panic| Err(SinkError::Transport(panic_message(panic.as_ref()))));
        let batch = guard.finish();

        metrics::flush_duration_ms().record(started.elapsed().as_secs_f64() * 1000.0, &[]);
        metrics::flush_batch_size().record(count as u64, &[]);

        let mut state = self.lock();
        state.in_flight = false;
        self.idle.notify_waiters();

        match result {
            Ok(ack) => {
                state.retry_count = 0;
                if !state.queue.is_empty() {
                    self.arm_timer(&mut state);
                }
                drop(state);

                record_flush_result(&span, "ok");
                metrics::flush_attempts().add(1, &[KeyValue::new("result", "ok")]);
                debug!(parent: &span, accepted = ack.accepted, "successfully flushed events");
                FlushOutcome::Delivered { count }
            }
            Err(e) => {
                state.queue.requeue_front(batch);
                let retry_in = self.retry.next_delay(state.retry_count);
                if retry_in.is_some() {
                    state.retry_count += 1;
                }
                let attempt = state.retry_count;
                drop(state);

                record_flush_result(&span, "error");
                metrics::flush_attempts().add(1, &[KeyValue::new("result", "error")]);
                error!(parent: &span, error = %e, "failed to flush events");

                match retry_in {
                    Some(delay) => {
                        metrics::retries_scheduled()
                            .add(1, &[KeyValue::new("attempt", i64::from(attempt))]);
                        debug!(parent: &span, attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");
                        self.schedule_retry(delay);
                    }
                    None => {
                        metrics::retries_exhausted().add(1, &[]);
                        warn!(
                            parent: &span,
                            queued = self.queued_len(),
                            "retries exhausted, events stay queued until the next flush trigger"
                        );
                    }
                }
                FlushOutcome::Failed { count, retry_in }
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, delay: Duration) {
        let pipeline = Arc::clone(self);
        // Retries are not tracked: a retry firing during another flush is a no-op.
        let _ = self.scheduler.schedule(
            delay,
            Box::pin(async move {
                pipeline.flush().await;
            }),
        );
    }

    /// Arm the interval timer unless one is already pending.
    fn arm_timer(self: &Arc<Self>, state: &mut FlushState) {
        if state.timer.is_some() {
            return;
        }
        state.timer_seq += 1;
        let seq = state.timer_seq;
        let pipeline = Arc::clone(self);
        let handle = self.scheduler.schedule(
            self.config.flush_interval,
            Box::pin(async move {
                pipeline.on_timer(seq).await;
            }),
        );
        state.timer = Some((seq, handle));
    }

    async fn on_timer(self: Arc<Self>, seq: u64) {
        {
            let mut state = self.lock();
            if matches!(state.timer, Some((pending, _)) if pending == seq) {
                state.timer = None;
            }
        }
        self.flush().await;
    }

    fn lock(&self) -> MutexGuard<'_, FlushState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

/// Holds a claimed batch while the sink call is pending. If the flush
/// future is dropped before finishing, the batch returns to the head of
/// the queue and the in-flight slot is released.
struct InFlight<'a> {
    pipeline: &'a Pipeline,
    batch: Option<Vec<Event>>,
}

impl InFlight<'_> {
    fn finish(mut self) -> Vec<Event> {
        self.batch.take().unwrap_or_default()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            let mut state = self.pipeline.lock();
            state.queue.requeue_front(batch);
            state.in_flight = false;
            drop(state);
            self.pipeline.idle.notify_waiters();
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("sink panicked: {detail}")
}
