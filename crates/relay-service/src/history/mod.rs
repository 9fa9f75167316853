//! Bounded per-room message history.
//!
//! The room actor appends every broadcast before fanning it out; the
//! `/history` endpoint reads it back oldest-to-newest. Entries are opaque
//! serialized `ChatMessage` blobs.
//!
//! Two backends implement [`HistoryStore`]:
//!
//! - [`RedisHistoryStore`] - `room:{name}:messages` lists trimmed in a `MULTI` pipeline
//! - [`InMemoryHistoryStore`] - process-local, used when no Redis URL is configured

mod memory;
mod redis_store;

pub use self::memory::InMemoryHistoryStore;
pub use self::redis_store::RedisHistoryStore;

use crate::errors::RelayError;

/// Storage contract for room history.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append `payload` to the room's history, then trim it to the newest
    /// entries. Appending and trimming are one logical step.
    async fn append(&self, room: &str, payload: &str) -> Result<(), RelayError>;

    /// Return the room's history, oldest first.
    async fn list(&self, room: &str) -> Result<Vec<String>, RelayError>;
}

/// Storage key for a room's history list.
#[must_use]
pub fn history_key(room: &str) -> String {
    format!("room:{room}:messages")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_key_format() {
        assert_eq!(history_key("lobby"), "room:lobby:messages");
        assert_eq!(history_key(""), "room::messages");
    }
}
