//! Metric instrument factories for analytics-pipeline.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"analytics-pipeline"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for analytics-pipeline instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("analytics-pipeline")
}

/// Counter: events accepted by the tracking API.
/// Labels: `event_type`.
pub fn events_tracked() -> Counter<u64> {
    meter()
        .u64_counter("analytics.events.tracked")
        .with_description("Number of events accepted into the queue")
        .build()
}

/// Counter: events dropped because analytics is disabled.
pub fn events_discarded() -> Counter<u64> {
    meter()
        .u64_counter("analytics.events.discarded")
        .with_description("Number of events discarded while analytics is disabled")
        .build()
}

/// Counter: flush attempts that reached the sink.
/// Labels: `result` ("ok" | "error").
pub fn flush_attempts() -> Counter<u64> {
    meter()
        .u64_counter("analytics.flush.attempts")
        .with_description("Number of flush attempts")
        .build()
}

/// Histogram: events per flushed batch.
pub fn flush_batch_size() -> Histogram<u64> {
    meter()
        .u64_histogram("analytics.flush.batch_size")
        .with_description("Events per flush attempt")
        .build()
}

/// Histogram: sink call duration in milliseconds.
pub fn flush_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("analytics.flush.duration_ms")
        .with_description("Flush duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: automatic retries scheduled after a failed flush.
/// Labels: `attempt`.
pub fn retries_scheduled() -> Counter<u64> {
    meter()
        .u64_counter("analytics.retry.scheduled")
        .with_description("Number of scheduled flush retries")
        .build()
}

/// Counter: failures after which no further retry was scheduled.
pub fn retries_exhausted() -> Counter<u64> {
    meter()
        .u64_counter("analytics.retry.exhausted")
        .with_description("Flush failures with retries exhausted")
        .build()
}

/// Counter: raw sink operations (create_session, send_batch).
/// Labels: `operation`.
pub fn sink_operations() -> Counter<u64> {
    meter()
        .u64_counter("analytics.sink.operations")
        .with_description("Number of sink operations")
        .build()
}
