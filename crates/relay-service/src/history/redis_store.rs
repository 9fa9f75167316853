//! Redis history backend.
//!
//! # Key Patterns
//!
//! - `room:{name}:messages` - LIST of serialized messages, oldest at the head
//!
//! # Connection Pattern
//!
//! The redis-rs `MultiplexedConnection` is cheap to clone and safe to use
//! concurrently, so every operation clones it instead of sharing it behind a
//! lock.

use super::{history_key, HistoryStore};
use crate::errors::RelayError;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{error, instrument, warn};

/// Redis-backed history store.
#[derive(Clone)]
pub struct RedisHistoryStore {
    connection: MultiplexedConnection,
    /// Entries kept per room.
    limit: usize,
}

impl RedisHistoryStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::History` if the client cannot be opened or the
    /// connection fails.
    pub async fn new(redis_url: &str, limit: usize) -> Result<Self, RelayError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Do not log redis_url, it may carry credentials
            error!(target: "relay.history.redis", error = %e, "Failed to open Redis client");
            RelayError::History(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "relay.history.redis", error = %e, "Failed to connect to Redis");
                RelayError::History(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection, limit })
    }
}

/// Negative LTRIM start index keeping the newest `limit` entries.
///
/// Limits beyond `isize::MAX` saturate; they keep everything either way.
fn trim_start(limit: usize) -> isize {
    isize::try_from(limit).map_or(-isize::MAX, |limit| -limit)
}

/// `MULTI; RPUSH key payload; LTRIM key -limit -1; EXEC`
fn append_pipeline(key: &str, payload: &str, limit: usize) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .rpush(key, payload)
        .ignore()
        .ltrim(key, trim_start(limit), -1)
        .ignore();
    pipe
}

#[async_trait::async_trait]
impl HistoryStore for RedisHistoryStore {
    #[instrument(skip_all, fields(room = %room))]
    async fn append(&self, room: &str, payload: &str) -> Result<(), RelayError> {
        let mut conn = self.connection.clone();
        let key = history_key(room);

        append_pipeline(&key, payload, self.limit)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| {
                warn!(target: "relay.history.redis", error = %e, "Failed to append history");
                RelayError::History(format!("Failed to append history: {e}"))
            })
    }

    #[instrument(skip_all, fields(room = %room))]
    async fn list(&self, room: &str) -> Result<Vec<String>, RelayError> {
        let mut conn = self.connection.clone();
        let key = history_key(room);

        conn.lrange(&key, 0, -1).await.map_err(|e| {
            warn!(target: "relay.history.redis", error = %e, "Failed to read history");
            RelayError::History(format!("Failed to read history: {e}"))
        })
    }
}
