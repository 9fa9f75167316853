//! Message types for room actor communication.
//!
//! Requests travel over `tokio::sync::mpsc`; request-reply uses
//! `tokio::sync::oneshot`.

use crate::errors::RelayError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

/// Serialized message as delivered to a session's outbound mailbox.
///
/// Shared between all members of a fan-out, so it is reference counted.
pub type Payload = Arc<str>;

/// A session's entry in a room's membership.
///
/// The room actor holds the only `Sender` for the session's outbound mailbox.
/// Removing the member drops it, which closes the mailbox.
#[derive(Debug)]
pub struct RoomMember {
    pub session_id: Uuid,
    pub mailbox: mpsc::Sender<Payload>,
}

/// Messages sent to a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Add a session to the room.
    Register {
        member: RoomMember,
        /// `Err(RoomClosed)` if the room retired before processing the request.
        respond_to: oneshot::Sender<Result<(), RelayError>>,
    },

    /// Remove a session. No-op if it is not a member.
    Unregister { session_id: Uuid },

    /// Persist and fan out a serialized message.
    Broadcast { payload: String },

    /// Snapshot the room.
    GetState {
        respond_to: oneshot::Sender<RoomState>,
    },
}

/// Room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomLifecycle {
    /// At least one member.
    Active,
    /// No members since `since`. The room retires once the idle timeout
    /// elapses.
    Idle { since: Instant },
}

/// Point-in-time view of a room.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: String,
    pub member_count: usize,
    pub lifecycle: RoomLifecycle,
}
