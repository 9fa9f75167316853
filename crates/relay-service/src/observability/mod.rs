//! Observability for the relay service.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `relay_room_connections` | Gauge | `room` | Live members per room |
//! | `relay_room_messages_total` | Counter | `room` | Messages fanned out per room |
//! | `relay_rooms_active` | Gauge | none | Running room actors |
//! | `relay_slow_consumer_drops_total` | Counter | none | Members dropped for a full mailbox |
//! | `relay_history_append_failures_total` | Counter | none | Failed history appends |
//! | `relay_history_append_duration_seconds` | Histogram | none | History append latency |
//! | `relay_auth_rejections_total` | Counter | none | Connections refused before upgrade |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
