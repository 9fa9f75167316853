//! Room Relay Service Library
//!
//! Real-time text relay: clients connect over WebSocket, join a named room
//! and every message one member sends is delivered to all members of that
//! room. Each room keeps a bounded recent history for replay.
//!
//! # Architecture
//!
//! ```text
//! GET /ws ──auth──> RoomRegistry ──get_or_create──> RoomActor (per room)
//!                                                    ├── HistoryStore (append, then fan out)
//!                                                    └── ClientSession mailboxes
//! GET /history ───> HistoryStore::list
//! ```
//!
//! # Key Design Decisions
//!
//! - **Actor-owned membership**: only the room's own task touches its
//!   member set
//! - **Bounded mailboxes**: a member that cannot keep up is dropped rather
//!   than slowing down the room
//! - **Server-assigned identity**: `user_id`, `room` and `time` on every
//!   message come from the session, never from the client
//!
//! # Modules
//!
//! - [`actors`] - Room registry, room actors and client sessions
//! - [`auth`] - Connection token validation
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types and HTTP mapping
//! - [`handlers`] - HTTP/WebSocket handlers
//! - [`history`] - History store trait and backends
//! - [`models`] - Wire message model
//! - [`observability`] - Metrics and health endpoints
//! - [`routes`] - Router and application state

pub mod actors;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod models;
pub mod observability;
pub mod routes;
