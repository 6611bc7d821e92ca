//! Public tracking API.
//!
//! [`Analytics`] is the handle the host application holds. Every tracking
//! call is fire-and-forget: it enriches the event, queues it and returns.
//! When no sink is available the handle is disabled and every call is a
//! silent no-op.

use std::sync::Arc;

use opentelemetry::KeyValue;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::config::SinkConfig;
use crate::enrich::{ContextEnricher, Properties};
use crate::environment::{Environment, HostEnvironment};
use crate::model::{Session, SessionId};
use crate::pipeline::{
    FlushOutcome, PAGE_VIEW, Pipeline, PipelineConfig, Scheduler, SkipReason, TokioScheduler,
};
use crate::session::SessionIdentity;
use crate::sink::{self, Sink};
use crate::telemetry::metrics;

/// Handle to a running pipeline. Cheap to clone; clones share the queue.
#[derive(Clone, Default)]
pub struct Analytics {
    inner: Option<Arc<Active>>,
}

struct Active {
    pipeline: Arc<Pipeline>,
    enricher: ContextEnricher,
    session: Session,
}

/// Totals from [`Analytics::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: usize,
    pub remaining: usize,
    pub failed: bool,
}

impl Analytics {
    /// A handle that accepts and discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn builder() -> AnalyticsBuilder {
        AnalyticsBuilder::default()
    }

    /// Resolve the sink from the environment and start. Configuration or
    /// connection problems leave analytics disabled.
    pub async fn from_env(environment: Arc<dyn Environment>) -> Self {
        Self::builder()
            .environment(environment)
            .start_from_env()
            .await
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.inner.as_ref().map(|a| &a.session)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session().map(|s| &s.session_id)
    }

    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.inner.as_ref().map(|a| &a.pipeline)
    }

    pub fn queued_len(&self) -> usize {
        self.pipeline().map_or(0, |p| p.queued_len())
    }

    /// Track an application-defined event.
    pub fn track_event(&self, name: &str, props: Option<Properties>) {
        self.track(name, props);
    }

    /// Track a page view. `path` and the current title override the
    /// ambient location.
    pub fn track_page_view(&self, path: &str, props: Option<Properties>) {
        let Some(active) = &self.inner else {
            self.discard(PAGE_VIEW);
            return;
        };
        let title = active.enricher.environment().snapshot().title;
        let mut data = Properties::new();
        data.insert("path".into(), json!(path));
        data.insert("title".into(), json!(title));
        data.extend(props.unwrap_or_default());
        self.track(PAGE_VIEW, Some(data));
    }

    /// Track a user interaction with an element.
    pub fn track_interaction(&self, element_id: &str, action: &str, props: Option<Properties>) {
        let mut data = Properties::new();
        data.insert("elementId".into(), json!(element_id));
        data.insert("action".into(), json!(action));
        data.extend(props.unwrap_or_default());
        self.track("interaction", Some(data));
    }

    /// Track an error. The `source()` chain stands in for a stack trace.
    pub fn track_error(
        &self,
        err: &(dyn std::error::Error + 'static),
        context: Option<Properties>,
    ) {
        let mut detail = Properties::new();
        detail.insert("message".into(), json!(err.to_string()));
        detail.insert("stack".into(), source_chain(err));
        detail.extend(context.unwrap_or_default());

        let mut data = Properties::new();
        data.insert("error".into(), Value::Object(detail));
        self.track("error", Some(data));
    }

    /// Track a set of numeric measurements.
    pub fn track_performance<K, I>(&self, measurements: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let metrics: Properties = measurements
            .into_iter()
            .map(|(k, v)| (k.into(), json!(v)))
            .collect();
        let mut data = Properties::new();
        data.insert("metrics".into(), Value::Object(metrics));
        self.track("performance", Some(data));
    }

    /// Run one flush now and wait for it.
    pub async fn flush_now(&self) -> FlushOutcome {
        match self.pipeline() {
            Some(pipeline) => pipeline.flush().await,
            None => FlushOutcome::Skipped(SkipReason::Disabled),
        }
    }

    /// Flush until the queue is empty or a flush fails. Waits out any
    /// flush already in flight.
    pub async fn drain(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        let Some(pipeline) = self.pipeline() else {
            return summary;
        };

        loop {
            match pipeline.flush().await {
                FlushOutcome::Delivered { count } => summary.delivered += count,
                FlushOutcome::Skipped(SkipReason::InFlight) => pipeline.wait_idle().await,
                FlushOutcome::Skipped(_) => break,
                FlushOutcome::Failed { .. } => {
                    summary.failed = true;
                    break;
                }
            }
        }
        summary.remaining = pipeline.queued_len();
        summary
    }

    /// Host teardown: cancel the interval timer and send what is queued
    /// without waiting for the result.
    pub fn teardown(&self) {
        if let Some(pipeline) = self.pipeline() {
            pipeline.teardown();
        }
    }

    fn track(&self, event_type: &str, props: Option<Properties>) {
        let Some(active) = &self.inner else {
            self.discard(event_type);
            return;
        };

        let event = active.enricher.event(event_type, props);
        debug!(event_type, event = ?event, "tracking event");
        metrics::events_tracked().add(1, &[KeyValue::new("event_type", event_type.to_string())]);
        active.pipeline.enqueue(event);
    }

    fn discard(&self, event_type: &str) {
        metrics::events_discarded().add(1, &[KeyValue::new("event_type", event_type.to_string())]);
    }
}

impl std::fmt::Debug for Analytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analytics")
            .field("enabled", &self.is_enabled())
            .field("session_id", &self.session_id())
            .finish()
    }
}

fn source_chain(err: &(dyn std::error::Error + 'static)) -> Value {
    let mut lines = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    if lines.is_empty() {
        Value::Null
    } else {
        json!(lines.join("\n"))
    }
}

/// Wires a sink, environment and scheduler into an [`Analytics`] handle.
#[derive(Default)]
pub struct AnalyticsBuilder {
    sink: Option<Arc<dyn Sink>>,
    environment: Option<Arc<dyn Environment>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    config: PipelineConfig,
}

impl AnalyticsBuilder {
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the sink from `ANALYTICS_*` variables, then [`start`](Self::start).
    ///
    /// A missing, malformed or unreachable sink yields a disabled handle,
    /// reported by a single warning.
    pub async fn start_from_env(mut self) -> Analytics {
        let resolved = match SinkConfig::from_env() {
            Ok(Some(config)) => sink::connect(&config).await.map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        match resolved {
            Ok(sink) => {
                self.sink = sink;
                self.start()
            }
            Err(e) => {
                warn!(error = %e, "analytics sink not available, analytics disabled");
                Analytics::disabled()
            }
        }
    }

    /// Start the pipeline: register the session with the sink and track the
    /// initial page view. Without a sink (or a runtime) the handle is
    /// disabled.
    pub fn start(self) -> Analytics {
        let Some(sink) = self.sink else {
            warn!("analytics sink not available, analytics disabled");
            return Analytics::disabled();
        };

        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => match TokioScheduler::current() {
                Ok(scheduler) => Arc::new(scheduler) as Arc<dyn Scheduler>,
                Err(e) => {
                    warn!(error = %e, "no scheduler available, analytics disabled");
                    return Analytics::disabled();
                }
            },
        };

        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(HostEnvironment::from_process()));

        let identity = SessionIdentity::new();
        let session = identity.create_session(environment.as_ref());
        let enricher = ContextEnricher::new(identity.id().clone(), Arc::clone(&environment));
        let pipeline = Pipeline::new(Arc::clone(&sink), Arc::clone(&scheduler), self.config);

        debug!(session = ?session, "creating session");
        let registered = session.clone();
        scheduler.spawn(Box::pin(async move {
            match sink.create_session(&registered).await {
                Ok(_) => debug!(session_id = %registered.session_id, "session created"),
                Err(e) => error!(error = %e, "failed to create session"),
            }
        }));

        let analytics = Analytics {
            inner: Some(Arc::new(Active {
                pipeline,
                enricher,
                session,
            })),
        };

        let path = environment.snapshot().path;
        let mut initial = Properties::new();
        initial.insert("isInitialLoad".into(), json!(true));
        analytics.track_page_view(&path, Some(initial));

        analytics
    }
}
