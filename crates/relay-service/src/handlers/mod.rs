//! HTTP request handlers for the relay service.

pub mod history;
pub mod metrics;
pub mod ws;

pub use history::history_handler;
pub use metrics::metrics_handler;
pub use ws::ws_handler;

use crate::config::DEFAULT_ROOM;

/// Resolve the `room` query parameter. Absent or empty selects the default
/// room.
pub(crate) fn room_or_default(room: Option<&str>) -> &str {
    match room {
        Some(room) if !room.is_empty() => room,
        _ => DEFAULT_ROOM,
    }
}
