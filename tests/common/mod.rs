//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analytics_pipeline::enrich::ContextEnricher;
use analytics_pipeline::model::{Event, PerformanceTiming, SessionId, WireEvent};
use analytics_pipeline::pipeline::{
    Pipeline, PipelineConfig, Scheduler, Task, TimerHandle, TokioScheduler,
};
use analytics_pipeline::sink::MemorySink;
use analytics_pipeline::{EnvironmentSnapshot, HostEnvironment};

pub fn test_environment() -> Arc<HostEnvironment> {
    Arc::new(HostEnvironment::new(EnvironmentSnapshot {
        user_agent: "test-agent/1.0".to_string(),
        screen_size: "1920x1080".to_string(),
        language: "en-GB".to_string(),
        referrer: "https://example.com/".to_string(),
        platform: "linux".to_string(),
        path: "/intro".to_string(),
        title: "Intro".to_string(),
        viewport_size: "1280x720".to_string(),
        performance: PerformanceTiming {
            load_time: Some(420),
            render_time: Some(180),
        },
    }))
}

/// Scheduler that records every delay it is asked for.
pub struct RecordingScheduler {
    inner: TokioScheduler,
    delays: Mutex<Vec<Duration>>,
    spawns: AtomicUsize,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: TokioScheduler::current().expect("tokio runtime"),
            delays: Mutex::new(Vec::new()),
            spawns: AtomicUsize::new(0),
        })
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl Scheduler for RecordingScheduler {
    fn spawn(&self, task: Task) {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(task);
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        self.delays.lock().unwrap().push(delay);
        self.inner.schedule(delay, task)
    }
}

pub fn pipeline_with(sink: Arc<MemorySink>, scheduler: Arc<dyn Scheduler>) -> Arc<Pipeline> {
    Pipeline::new(sink, scheduler, PipelineConfig::default())
}

pub fn pipeline(sink: Arc<MemorySink>) -> Arc<Pipeline> {
    pipeline_with(sink, Arc::new(TokioScheduler::current().expect("tokio runtime")))
}

/// Generic, non-priority events named `e1..=en`.
pub fn events(n: usize) -> Vec<Event> {
    events_from(1, n)
}

/// Events named `e{first}..=e{first + n - 1}`.
pub fn events_from(first: usize, n: usize) -> Vec<Event> {
    let enricher = ContextEnricher::new(SessionId::new(), test_environment());
    (first..first + n)
        .map(|i| enricher.event(format!("e{i}"), None))
        .collect()
}

pub fn event(name: &str) -> Event {
    ContextEnricher::new(SessionId::new(), test_environment()).event(name, None)
}

pub fn names(events: &[WireEvent]) -> Vec<String> {
    events.iter().map(|e| e.event_type.clone()).collect()
}

pub fn expected(first: usize, n: usize) -> Vec<String> {
    (first..first + n).map(|i| format!("e{i}")).collect()
}

/// Let spawned tasks run; advances the paused clock by 1ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
