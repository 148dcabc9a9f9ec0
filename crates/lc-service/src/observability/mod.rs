//! Observability for the Live Class Controller.
//!
//! # Privacy by Default
//!
//! Actor spans use `#[instrument(skip_all)]` with explicit safe fields.
//! Chat bodies and peer payloads are never logged or used as labels; only
//! their lengths may appear in debug events.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `lc_connections_active` | Gauge | none | Open client connections |
//! | `lc_rooms_active` | Gauge | none | Live rooms |
//! | `lc_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `lc_events_received_total` | Counter | `event` | Decoded client events |
//! | `lc_events_rejected_total` | Counter | `reason` | Events answered with `event-rejected` |
//! | `lc_events_dropped_total` | Counter | `reason` | Events silently dropped |
//! | `lc_messages_dropped_total` | Counter | `actor_type` | Full-mailbox drops |
//! | `lc_rooms_reclaimed_total` | Counter | none | Rooms reclaimed after the grace period |
//! | `lc_actor_panics_total` | Counter | `actor_type` | Actor panics (bugs) |
//! | `lc_event_latency_seconds` | Histogram | `event` | Decode-to-fan-out latency |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::{
    init_metrics_recorder, record_actor_panic, record_event_dropped, record_event_latency,
    record_event_received, record_event_rejected, record_message_dropped, record_room_reclaimed,
    set_actor_mailbox_depth, set_connections_active, set_rooms_active,
};
