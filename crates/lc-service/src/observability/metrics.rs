//! Metrics definitions for the Live Class Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `lc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `actor_type`: 3 values (controller, room, connection)
//! - `event`: bounded by protocol event names (~7 values, plus `unknown`)
//! - `reason`: bounded by rejection and drop reasons (~10 values)
//!
//! Room and user identifiers are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Event handling latency buckets - in-memory fan-out, p99 < 50ms
        .set_buckets_for_metric(
            Matcher::Prefix("lc_event".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Connection & Room Metrics (Gauges)
// ============================================================================

/// Set the number of open client connections.
///
/// Metric: `lc_connections_active`
/// Labels: none
pub fn set_connections_active(count: usize) {
    // usize to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("lc_connections_active").set(count as f64);
}

/// Set the number of live rooms.
///
/// Metric: `lc_rooms_active`
/// Labels: none
pub fn set_rooms_active(count: usize) {
    // usize to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("lc_rooms_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `lc_actor_mailbox_depth`
/// Labels: `actor_type` (controller, room, connection)
///
/// Used for backpressure monitoring. High values indicate the actor is
/// falling behind in message processing.
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    // usize to f64 conversion is safe for realistic mailbox depths
    #[allow(clippy::cast_precision_loss)]
    gauge!("lc_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Event Metrics (Counters and Histograms)
// ============================================================================

/// Record a decoded client event.
///
/// Metric: `lc_events_received_total`
/// Labels: `event`
pub fn record_event_received(event: &str) {
    counter!("lc_events_received_total", "event" => event.to_string()).increment(1);
}

/// Record a client event rejected at the boundary.
///
/// Metric: `lc_events_rejected_total`
/// Labels: `reason` (malformed_frame, unknown_event, invalid_payload,
/// room_full, service_full, draining)
pub fn record_event_rejected(reason: &str) {
    counter!("lc_events_rejected_total", "reason" => reason.to_string()).increment(1);
}

/// Record an event dropped without delivery.
///
/// Metric: `lc_events_dropped_total`
/// Labels: `reason` (no_room, no_broadcaster, recipient_absent, internal)
///
/// Drops are expected under normal operation: chat and signaling are
/// best-effort.
pub fn record_event_dropped(reason: &str) {
    counter!("lc_events_dropped_total", "reason" => reason.to_string()).increment(1);
}

/// Record client event handling latency, from decode to fan-out.
///
/// Metric: `lc_event_latency_seconds`
/// Labels: `event`
pub fn record_event_latency(event: &str, duration: Duration) {
    histogram!("lc_event_latency_seconds", "event" => event.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Actor Metrics (Counters)
// ============================================================================

/// Record a message dropped because an actor mailbox was full.
///
/// Metric: `lc_messages_dropped_total`
/// Labels: `actor_type`
///
/// A drop toward a connection disconnects that connection so it
/// resynchronizes on reconnect.
pub fn record_message_dropped(actor_type: &str) {
    counter!("lc_messages_dropped_total", "actor_type" => actor_type.to_string()).increment(1);
}

/// Record a room reclaimed after its empty grace period.
///
/// Metric: `lc_rooms_reclaimed_total`
/// Labels: none
pub fn record_room_reclaimed() {
    counter!("lc_rooms_reclaimed_total").increment(1);
}

/// Record an actor panic event.
///
/// Metric: `lc_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &str) {
    counter!("lc_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_recording_without_recorder_is_noop() {
        // No global recorder installed: every call must be a silent no-op.
        set_connections_active(3);
        set_rooms_active(1);
        set_actor_mailbox_depth("room", 12);
        record_event_received("join-room");
        record_event_rejected("malformed_frame");
        record_event_dropped("no_room");
        record_event_latency("send-message", Duration::from_millis(2));
        record_message_dropped("connection");
        record_room_reclaimed();
        record_actor_panic("room");
    }

    #[test]
    fn test_counters_are_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_event_rejected("invalid_payload");
            record_event_rejected("invalid_payload");
            record_room_reclaimed();
        });

        let snapshot = snapshotter.snapshot().into_vec();

        let rejected = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "lc_events_rejected_total")
            .expect("rejection counter recorded");
        assert!(rejected
            .0
            .key()
            .labels()
            .any(|l| l.key() == "reason" && l.value() == "invalid_payload"));
        assert_eq!(rejected.3, DebugValue::Counter(2));

        assert!(snapshot
            .iter()
            .any(|(key, _, _, value)| key.key().name() == "lc_rooms_reclaimed_total"
                && *value == DebugValue::Counter(1)));
    }
}
