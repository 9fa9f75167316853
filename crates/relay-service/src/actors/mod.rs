//! Room hub actor model.
//!
//! ```text
//! RoomRegistry (one per process, name -> RoomHandle)
//! └── RoomActor (one per room name)
//!     ├── owns membership, no lock
//!     └── fans out to N ClientSessions
//!         └── ClientSession (read loop + write loop per connection)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Message passing**: membership changes and broadcasts go through the
//!   room actor's `tokio::sync::mpsc` mailbox and are applied in arrival order
//! - **Persist, then fan out**: history append completes before a message is
//!   enqueued to any member
//! - **Slow consumers**: a full outbound mailbox drops the member on the spot
//! - **Idle rooms retire**: an empty room stops after the idle timeout and
//!   leaves the registry
//! - **CancellationToken propagation**: room actors run under child tokens of
//!   the registry's token
//!
//! # Modules
//!
//! - [`registry`] - `RoomRegistry`, get-or-create and join
//! - [`room`] - `RoomActor` and `RoomHandle`
//! - [`session`] - `ClientSession` read/write loops
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - In-process actor counters

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;
pub mod session;

pub use messages::*;
pub use metrics::ActorMetrics;
pub use registry::RoomRegistry;
pub use room::{RoomActor, RoomHandle, RoomSettings};
pub use session::{ClientSession, ReadEnd, WriteEnd};
