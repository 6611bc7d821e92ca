//! Flush span helpers.
//!
//! Provides span creation and result recording for batches flowing
//! from the queue to the sink.

use tracing::Span;

/// Start a span for one flush attempt.
///
/// The `flush.result` field is declared empty and is filled in by
/// [`record_flush_result`].
pub fn start_flush_span(batch_len: usize, retry_count: u32) -> Span {
    tracing::info_span!(
        "analytics.flush",
        "flush.events" = batch_len,
        "flush.retry_count" = retry_count,
        "flush.result" = tracing::field::Empty,
    )
}

/// Record how the flush ended ("ok" | "error").
pub fn record_flush_result(span: &Span, result: &str) {
    span.record("flush.result", result);
}
