//! Integration tests for telemetry initialization and span helpers.

use analytics_pipeline::telemetry::{self, TelemetryConfig};

#[test]
fn telemetry_initializes_without_endpoint() {
    // Only one global subscriber per process; a second init returns Err.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "analytics-test".to_string(),
        log_level: "debug".to_string(),
    };
    let _guard = telemetry::init_telemetry(config);
}

#[test]
fn flush_span_creates_and_records_result() {
    let span = telemetry::flush::start_flush_span(10, 0);
    telemetry::flush::record_flush_result(&span, "ok");

    let span = telemetry::flush::start_flush_span(3, 2);
    telemetry::flush::record_flush_result(&span, "error");
}

#[test]
fn metric_instruments_are_usable_without_provider() {
    telemetry::metrics::events_tracked().add(1, &[]);
    telemetry::metrics::flush_batch_size().record(10, &[]);
    telemetry::metrics::flush_duration_ms().record(1.5, &[]);
}
