//! In-process actor counters.
//!
//! Prometheus series are emitted through `crate::observability::metrics`.
//! These atomics mirror the ones the service itself needs to read back
//! (readiness reporting, tests).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Aggregated counters for the room actor system.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Room actors currently running.
    pub active_rooms: AtomicUsize,
    /// Sessions currently registered with a room.
    pub active_sessions: AtomicUsize,
    /// Room actors spawned since startup.
    pub rooms_created: AtomicU64,
    /// Broadcasts processed across all rooms.
    pub messages_processed: AtomicU64,
    /// Members dropped for a full outbound mailbox.
    pub slow_consumer_drops: AtomicU64,
}

impl ActorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A room actor started. Returns the new active count.
    pub fn room_created(&self) -> usize {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
        self.active_rooms.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// A room actor stopped. Returns the new active count.
    pub fn room_removed(&self) -> usize {
        self.active_rooms.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn session_registered(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_removed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slow_consumer_drop(&self) {
        self.slow_consumer_drops.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rooms_created(&self) -> u64 {
        self.rooms_created.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn slow_consumer_drops(&self) -> u64 {
        self.slow_consumer_drops.load(Ordering::Relaxed)
    }
}
