//! `RoomRegistry` - process-wide lookup and creation of room actors.
//!
//! One registry is created at startup and shared through application state.
//! A single mutex guards the name -> actor map; it is held only for
//! insert-if-absent and for an actor removing its own entry on retirement.
//! Everything else about a room lives inside its actor.

use super::messages::{Payload, RoomMember};
use super::metrics::ActorMetrics;
use super::room::{RoomActor, RoomHandle, RoomSettings};
use crate::errors::RelayError;
use crate::history::HistoryStore;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Attempts at joining a room that keeps retiring underneath the joiner.
const MAX_JOIN_ATTEMPTS: usize = 3;

/// A live room actor and its task.
struct ManagedRoom {
    handle: RoomHandle,
    task_handle: JoinHandle<()>,
}

/// Shared registry state. Room actors hold a `Weak` to it.
pub(crate) struct RegistryInner {
    rooms: Mutex<HashMap<String, ManagedRoom>>,
    settings: RoomSettings,
    history: Arc<dyn HistoryStore>,
    metrics: Arc<ActorMetrics>,
    cancel_token: CancellationToken,
}

impl RegistryInner {
    /// Remove `room` only if the entry still belongs to `actor_id`. A newer
    /// actor registered under the same name is left alone.
    pub(crate) async fn remove_if_current(&self, room: &str, actor_id: Uuid) -> bool {
        let mut rooms = self.rooms.lock().await;

        let is_current = rooms
            .get(room)
            .is_some_and(|managed| managed.handle.actor_id() == actor_id);

        if is_current {
            // Our own JoinHandle; dropping it detaches the finishing task
            rooms.remove(room);
            debug!(
                target: "relay.actor.registry",
                room = %room,
                rooms = rooms.len(),
                "Room removed from registry"
            );
        }

        is_current
    }
}

/// Registry of room actors keyed by room name.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

impl RoomRegistry {
    /// Create an empty registry.
    ///
    /// The registry owns the root token of its room actors; only
    /// [`RoomRegistry::shutdown`] cancels it, so every actor is still in
    /// the map when shutdown collects their tasks.
    #[must_use]
    pub fn new(
        settings: RoomSettings,
        history: Arc<dyn HistoryStore>,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: Mutex::new(HashMap::new()),
                settings,
                history,
                metrics,
                cancel_token: CancellationToken::new(),
            }),
        }
    }

    /// Return the actor for `room`, starting one if none is running.
    ///
    /// Concurrent callers for the same name all receive the handle of a
    /// single actor. A retired or stopped entry is replaced.
    #[instrument(skip_all, fields(room = %room))]
    pub async fn get_or_create(&self, room: &str) -> RoomHandle {
        let mut rooms = self.inner.rooms.lock().await;

        if let Some(managed) = rooms.get(room) {
            if !managed.handle.is_closed() {
                return managed.handle.clone();
            }
            debug!(
                target: "relay.actor.registry",
                room = %room,
                "Replacing closed room actor"
            );
        }

        let (handle, task_handle) = RoomActor::spawn(
            room.to_string(),
            &self.inner.settings,
            Arc::clone(&self.inner.history),
            Arc::clone(&self.inner.metrics),
            Arc::downgrade(&self.inner),
            self.inner.cancel_token.child_token(),
        );

        rooms.insert(
            room.to_string(),
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );

        info!(
            target: "relay.actor.registry",
            room = %room,
            rooms = rooms.len(),
            "Room actor created"
        );

        handle
    }

    /// Register a session with `room` and return its outbound mailbox.
    ///
    /// A room that retires between lookup and registration answers with
    /// `RoomClosed`; the join then retries against a fresh actor.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::RoomClosed` if every attempt hit a closing room,
    /// which in practice means the service is shutting down.
    pub async fn join(
        &self,
        room: &str,
        session_id: Uuid,
        mailbox_capacity: usize,
    ) -> Result<(RoomHandle, mpsc::Receiver<Payload>), RelayError> {
        for attempt in 1..=MAX_JOIN_ATTEMPTS {
            let handle = self.get_or_create(room).await;
            let (mailbox, outbound) = mpsc::channel(mailbox_capacity);

            let member = RoomMember {
                session_id,
                mailbox,
            };

            match handle.register(member).await {
                Ok(()) => return Ok((handle, outbound)),
                Err(RelayError::RoomClosed(_)) => {
                    debug!(
                        target: "relay.actor.registry",
                        room = %room,
                        attempt = attempt,
                        "Room closed during join, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            target: "relay.actor.registry",
            room = %room,
            attempts = MAX_JOIN_ATTEMPTS,
            "Giving up joining room"
        );
        Err(RelayError::RoomClosed(room.to_string()))
    }

    /// Number of rooms currently in the registry.
    pub async fn room_count(&self) -> usize {
        self.inner.rooms.lock().await.len()
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.cancel_token.is_cancelled()
    }

    /// Cancel every room actor and wait up to `deadline` for each to finish.
    pub async fn shutdown(&self, deadline: Duration) {
        // Take the task handles before cancelling so no actor can remove
        // (and detach) its own entry first.
        let rooms: Vec<(String, ManagedRoom)> = {
            let mut rooms = self.inner.rooms.lock().await;
            rooms.drain().collect()
        };

        self.inner.cancel_token.cancel();

        info!(
            target: "relay.actor.registry",
            rooms = rooms.len(),
            "Shutting down room actors"
        );

        for (room, managed) in rooms {
            match tokio::time::timeout(deadline, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(target: "relay.actor.registry", room = %room, "Room actor completed cleanly");
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "relay.actor.registry",
                        room = %room,
                        error = ?e,
                        "Room actor task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(target: "relay.actor.registry", room = %room, "Room actor shutdown timed out");
                }
            }
        }
    }
}
