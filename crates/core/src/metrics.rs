//! Metrics definitions for the pagination engine.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "connections_resolved_total",
        "Total number of connections resolved, by strategy"
    );
    describe_histogram!(
        "connection_resolve_duration_seconds",
        "Time taken to resolve a connection in seconds"
    );
    describe_counter!(
        "cursor_decode_failures_total",
        "Total number of before/after cursors that failed to decode"
    );
    describe_counter!(
        "anchor_lookups_total",
        "Total number of point lookups made while relocating a cursor anchor"
    );
    describe_counter!(
        "stale_cursors_total",
        "Total number of cursors whose anchor could not be relocated"
    );
    describe_counter!(
        "tail_count_queries_total",
        "Total number of count queries issued to apply `last`"
    );
}

/// Record a resolved connection.
///
/// # Arguments
/// * `strategy` - The slicing strategy ("keyset", "offset" or "list")
pub fn record_connection_resolved(strategy: &'static str) {
    counter!("connections_resolved_total", "strategy" => strategy).increment(1);
}

/// Record connection resolution duration.
pub fn record_resolve_duration(duration_secs: f64) {
    histogram!("connection_resolve_duration_seconds").record(duration_secs);
}

/// Record a cursor that could not be decoded.
///
/// # Arguments
/// * `argument` - The argument carrying the cursor ("before" or "after")
pub fn record_cursor_decode_failure(argument: &'static str) {
    counter!("cursor_decode_failures_total", "argument" => argument).increment(1);
}

/// Record point lookups made by anchor relocation.
pub fn record_anchor_lookups(count: u64) {
    counter!("anchor_lookups_total").increment(count);
}

/// Record a cursor whose anchor was not found.
pub fn record_stale_cursor(argument: &'static str) {
    counter!("stale_cursors_total", "argument" => argument).increment(1);
}

/// Record a count issued to apply `last`.
pub fn record_tail_count() {
    counter!("tail_count_queries_total").increment(1);
}

/// A timer that records resolution duration when dropped.
pub struct ResolveTimer {
    start: Instant,
}

impl ResolveTimer {
    /// Start a new resolve timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ResolveTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResolveTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_resolve_duration(duration);
    }
}
