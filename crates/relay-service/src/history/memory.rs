//! Process-local history backend.

use super::HistoryStore;
use crate::errors::RelayError;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// In-memory history store.
///
/// Keeps at most `limit` entries per room, evicting the oldest first.
/// History does not survive a restart.
#[derive(Debug)]
pub struct InMemoryHistoryStore {
    limit: usize,
    rooms: Mutex<HashMap<String, VecDeque<String>>>,
}

impl InMemoryHistoryStore {
    /// Create a store keeping `limit` entries per room.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, room: &str, payload: &str) -> Result<(), RelayError> {
        let mut rooms = self.rooms.lock().await;
        let entries = rooms.entry(room.to_string()).or_default();
        entries.push_back(payload.to_string());
        while entries.len() > self.limit {
            entries.pop_front();
        }
        Ok(())
    }

    async fn list(&self, room: &str) -> Result<Vec<String>, RelayError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms
            .get(room)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_unknown_room_is_empty() {
        let store = InMemoryHistoryStore::new(100);
        assert!(store.list("nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_returns_oldest_first() {
        let store = InMemoryHistoryStore::new(100);
        store.append("lobby", "one").await.unwrap();
        store.append("lobby", "two").await.unwrap();
        store.append("lobby", "three").await.unwrap();

        assert_eq!(store.list("lobby").await.unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_append_evicts_oldest_beyond_limit() {
        let store = InMemoryHistoryStore::new(100);
        for i in 0..150 {
            store.append("lobby", &format!("msg-{i}")).await.unwrap();
        }

        let entries = store.list("lobby").await.unwrap();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries.first().map(String::as_str), Some("msg-50"));
        assert_eq!(entries.last().map(String::as_str), Some("msg-149"));
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let store = InMemoryHistoryStore::new(2);
        store.append("a", "a1").await.unwrap();
        store.append("b", "b1").await.unwrap();
        store.append("a", "a2").await.unwrap();
        store.append("a", "a3").await.unwrap();

        assert_eq!(store.list("a").await.unwrap(), vec!["a2", "a3"]);
        assert_eq!(store.list("b").await.unwrap(), vec!["b1"]);
    }
}
