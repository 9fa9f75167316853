//! Metrics definitions for the relay service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `relay_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! The `room` label is unbounded in principle (clients pick room names). Only
//! the two per-room series carry it; everything else is label-free.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Buckets for history append latency. Redis appends are expected well under
/// 10ms; the tail covers a struggling backend.
const HISTORY_APPEND_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
];

/// Build a Prometheus recorder with the relay's histogram buckets applied.
///
/// # Errors
///
/// Returns error if the bucket configuration is rejected.
pub fn build_metrics_recorder() -> Result<PrometheusBuilder, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("relay_history_append".to_string()),
            HISTORY_APPEND_BUCKETS,
        )
        .map_err(|e| format!("Failed to set history append buckets: {e}"))
}

/// Initialize the global Prometheus recorder and return the handle for
/// serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    build_metrics_recorder()?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room Metrics
// ============================================================================

/// A member joined `room`.
///
/// Metric: `relay_room_connections`
/// Labels: `room`
pub fn record_room_join(room: &str) {
    gauge!("relay_room_connections", "room" => room.to_string()).increment(1.0);
}

/// A member left `room`, by unregistering or by being dropped.
///
/// Metric: `relay_room_connections`
/// Labels: `room`
pub fn record_room_leave(room: &str) {
    gauge!("relay_room_connections", "room" => room.to_string()).decrement(1.0);
}

/// A message was accepted for fan-out in `room`.
///
/// Metric: `relay_room_messages_total`
/// Labels: `room`
pub fn record_room_message(room: &str) {
    counter!("relay_room_messages_total", "room" => room.to_string()).increment(1);
}

/// Set the number of live room actors.
///
/// Metric: `relay_rooms_active`
pub fn set_rooms_active(count: usize) {
    // usize to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_rooms_active").set(count as f64);
}

/// A member was dropped because its outbound mailbox was full.
///
/// Metric: `relay_slow_consumer_drops_total`
pub fn record_slow_consumer_drop() {
    counter!("relay_slow_consumer_drops_total").increment(1);
}

// ============================================================================
// History Metrics
// ============================================================================

/// Record the latency of a successful history append.
///
/// Metric: `relay_history_append_duration_seconds`
pub fn record_history_append(duration: Duration) {
    histogram!("relay_history_append_duration_seconds").record(duration.as_secs_f64());
}

/// A history append failed. Fan-out proceeds regardless.
///
/// Metric: `relay_history_append_failures_total`
pub fn record_history_append_failure() {
    counter!("relay_history_append_failures_total").increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// A connection attempt was rejected before upgrade.
///
/// Metric: `relay_auth_rejections_total`
pub fn record_auth_rejection() {
    counter!("relay_auth_rejections_total").increment(1);
}
