//! `RoomActor` - one task per room name, sole owner of the room's membership.
//!
//! Each `RoomActor`:
//! - Serializes register/unregister/broadcast requests through its mailbox
//! - Persists every broadcast to history before fanning it out
//! - Drops members whose outbound mailbox is full, inline, without an
//!   Unregister round-trip
//! - Retires itself after sitting empty for the idle timeout
//!
//! # Retirement
//!
//! On retirement (idle timeout or cancellation) the actor removes its own
//! registry entry, closes its mailbox and drains what is already queued.
//! Queued `Register` requests are answered with `RelayError::RoomClosed`, so
//! the joining session goes back to the registry and gets a fresh actor.

use super::messages::{Payload, RoomLifecycle, RoomMember, RoomMessage, RoomState};
use super::metrics::ActorMetrics;
use super::registry::RegistryInner;
use crate::config::Config;
use crate::errors::RelayError;
use crate::history::HistoryStore;
use crate::observability::metrics as prom;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Per-room settings taken from `Config`.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Capacity of the room actor's mailbox.
    pub mailbox_capacity: usize,
    /// How long a room may stay empty before it retires.
    pub idle_timeout: Duration,
}

impl From<&Config> for RoomSettings {
    fn from(config: &Config) -> Self {
        Self {
            mailbox_capacity: config.room_mailbox_capacity,
            idle_timeout: config.room_idle_timeout,
        }
    }
}

/// Handle to a `RoomActor`.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    room: String,
    actor_id: Uuid,
}

impl RoomHandle {
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Identifies the actor instance behind this handle. A room name that
    /// was retired and recreated gets a new id.
    #[must_use]
    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }

    /// Whether the actor has stopped accepting requests.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn closed(&self) -> RelayError {
        RelayError::RoomClosed(self.room.clone())
    }

    /// Add `member` to the room.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::RoomClosed` if the actor retired before the
    /// request was processed. The member (and its mailbox sender) is dropped.
    pub async fn register(&self, member: RoomMember) -> Result<(), RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomMessage::Register {
                member,
                respond_to: tx,
            })
            .await
            .map_err(|_| self.closed())?;

        rx.await.map_err(|_| self.closed())?
    }

    /// Remove a session from the room. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::RoomClosed` if the actor is gone, in which case
    /// the session is no longer a member anyway.
    pub async fn unregister(&self, session_id: Uuid) -> Result<(), RelayError> {
        self.sender
            .send(RoomMessage::Unregister { session_id })
            .await
            .map_err(|_| self.closed())
    }

    /// Queue a serialized message for persistence and fan-out.
    ///
    /// Waits for mailbox capacity.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::RoomClosed` if the actor is gone.
    pub async fn broadcast(&self, payload: String) -> Result<(), RelayError> {
        self.sender
            .send(RoomMessage::Broadcast { payload })
            .await
            .map_err(|_| self.closed())
    }

    /// Snapshot the room.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::RoomClosed` if the actor is gone.
    pub async fn get_state(&self) -> Result<RoomState, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomMessage::GetState { respond_to: tx })
            .await
            .map_err(|_| self.closed())?;

        rx.await.map_err(|_| self.closed())
    }
}

/// Why a member left the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaveReason {
    Unregistered,
    SlowConsumer,
    Disconnected,
    RoomClosed,
}

impl LeaveReason {
    const fn as_str(self) -> &'static str {
        match self {
            LeaveReason::Unregistered => "unregistered",
            LeaveReason::SlowConsumer => "slow_consumer",
            LeaveReason::Disconnected => "disconnected",
            LeaveReason::RoomClosed => "room_closed",
        }
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    room: String,
    actor_id: Uuid,
    receiver: mpsc::Receiver<RoomMessage>,
    cancel_token: CancellationToken,
    members: HashMap<Uuid, RoomMember>,
    lifecycle: RoomLifecycle,
    idle_timeout: Duration,
    history: Arc<dyn HistoryStore>,
    metrics: Arc<ActorMetrics>,
    /// Used only to remove our own entry on retirement.
    registry: Weak<RegistryInner>,
}

impl RoomActor {
    /// Spawn a room actor.
    ///
    /// The room starts Idle: if nobody registers within the idle timeout it
    /// retires.
    pub(crate) fn spawn(
        room: String,
        settings: &RoomSettings,
        history: Arc<dyn HistoryStore>,
        metrics: Arc<ActorMetrics>,
        registry: Weak<RegistryInner>,
        cancel_token: CancellationToken,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(settings.mailbox_capacity);
        let actor_id = Uuid::new_v4();

        prom::set_rooms_active(metrics.room_created());

        let actor = Self {
            room: room.clone(),
            actor_id,
            receiver,
            cancel_token,
            members: HashMap::new(),
            lifecycle: RoomLifecycle::Idle {
                since: Instant::now(),
            },
            idle_timeout: settings.idle_timeout,
            history,
            metrics,
            registry,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomHandle {
            sender,
            room,
            actor_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "relay.actor.room", fields(room = %self.room, actor_id = %self.actor_id))]
    async fn run(mut self) {
        debug!(target: "relay.actor.room", room = %self.room, "RoomActor started");

        loop {
            let idle_deadline = self.idle_deadline();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "relay.actor.room",
                        room = %self.room,
                        members = self.members.len(),
                        "RoomActor received cancellation signal"
                    );
                    break;
                }

                () = sleep_until(idle_deadline) => {
                    info!(
                        target: "relay.actor.room",
                        room = %self.room,
                        idle_timeout_secs = self.idle_timeout.as_secs(),
                        "Room idle timeout elapsed, retiring"
                    );
                    break;
                }

                message = self.receiver.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            // Every handle dropped, including the registry's
                            debug!(target: "relay.actor.room", room = %self.room, "All room handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        self.retire().await;
    }

    fn idle_deadline(&self) -> Option<Instant> {
        match self.lifecycle {
            RoomLifecycle::Active => None,
            RoomLifecycle::Idle { since } => Some(since + self.idle_timeout),
        }
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Register { member, respond_to } => {
                let session_id = member.session_id;
                self.add_member(member);

                if respond_to.send(Ok(())).is_err() {
                    // Joiner gave up; its mailbox receiver is gone too
                    debug!(
                        target: "relay.actor.room",
                        room = %self.room,
                        session_id = %session_id,
                        "Register requester went away"
                    );
                    self.remove_member(session_id, LeaveReason::Disconnected);
                }
            }

            RoomMessage::Unregister { session_id } => {
                self.remove_member(session_id, LeaveReason::Unregistered);
            }

            RoomMessage::Broadcast { payload } => {
                self.handle_broadcast(payload).await;
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(RoomState {
                    room: self.room.clone(),
                    member_count: self.members.len(),
                    lifecycle: self.lifecycle,
                });
            }
        }
    }

    fn add_member(&mut self, member: RoomMember) {
        let session_id = member.session_id;

        if let Some(previous) = self.members.insert(session_id, member) {
            // Same session registering twice keeps one membership
            drop(previous);
        } else {
            prom::record_room_join(&self.room);
            self.metrics.session_registered();
        }

        self.lifecycle = RoomLifecycle::Active;

        debug!(
            target: "relay.actor.room",
            room = %self.room,
            session_id = %session_id,
            members = self.members.len(),
            "Member registered"
        );
    }

    /// Remove a member if present. Dropping the member drops the only sender
    /// for its outbound mailbox, which ends its outbound loop.
    fn remove_member(&mut self, session_id: Uuid, reason: LeaveReason) {
        let Some(member) = self.members.remove(&session_id) else {
            return;
        };
        drop(member);

        prom::record_room_leave(&self.room);
        self.metrics.session_removed();

        if self.members.is_empty() {
            self.lifecycle = RoomLifecycle::Idle {
                since: Instant::now(),
            };
        }

        debug!(
            target: "relay.actor.room",
            room = %self.room,
            session_id = %session_id,
            reason = reason.as_str(),
            members = self.members.len(),
            "Member removed"
        );
    }

    /// Persist, count, then fan out.
    async fn handle_broadcast(&mut self, payload: String) {
        let started = Instant::now();
        match self.history.append(&self.room, &payload).await {
            Ok(()) => prom::record_history_append(started.elapsed()),
            Err(e) => {
                warn!(
                    target: "relay.actor.room",
                    room = %self.room,
                    error = %e,
                    "History append failed, delivering anyway"
                );
                prom::record_history_append_failure();
            }
        }

        prom::record_room_message(&self.room);
        self.metrics.record_message_processed();

        let payload: Payload = Arc::from(payload);
        let mut departed = Vec::new();

        for (session_id, member) in &self.members {
            match member.mailbox.try_send(Arc::clone(&payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    departed.push((*session_id, LeaveReason::SlowConsumer));
                }
                Err(TrySendError::Closed(_)) => {
                    departed.push((*session_id, LeaveReason::Disconnected));
                }
            }
        }

        for (session_id, reason) in departed {
            if reason == LeaveReason::SlowConsumer {
                warn!(
                    target: "relay.actor.room",
                    room = %self.room,
                    session_id = %session_id,
                    "Outbound mailbox full, dropping slow consumer"
                );
                prom::record_slow_consumer_drop();
                self.metrics.record_slow_consumer_drop();
            }
            self.remove_member(session_id, reason);
        }
    }

    /// Leave the registry, stop accepting requests and release every member.
    async fn retire(mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if_current(&self.room, self.actor_id).await;
        }

        self.receiver.close();
        let mut rejected = 0_usize;
        while let Some(message) = self.receiver.recv().await {
            match message {
                RoomMessage::Register { respond_to, .. } => {
                    rejected += 1;
                    let _ = respond_to.send(Err(RelayError::RoomClosed(self.room.clone())));
                }
                other => self.handle_message(other).await,
            }
        }

        let session_ids: Vec<Uuid> = self.members.keys().copied().collect();
        for session_id in session_ids {
            self.remove_member(session_id, LeaveReason::RoomClosed);
        }

        prom::set_rooms_active(self.metrics.room_removed());

        info!(
            target: "relay.actor.room",
            room = %self.room,
            rejected_registrations = rejected,
            "RoomActor stopped"
        );
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistoryStore;
    use async_trait::async_trait;

    const IDLE: Duration = Duration::from_secs(300);

    fn settings() -> RoomSettings {
        RoomSettings {
            mailbox_capacity: 64,
            idle_timeout: IDLE,
        }
    }

    fn spawn_room(
        room: &str,
        history: Arc<dyn HistoryStore>,
    ) -> (RoomHandle, JoinHandle<()>, Arc<ActorMetrics>) {
        let metrics = ActorMetrics::new();
        let (handle, task) = RoomActor::spawn(
            room.to_string(),
            &settings(),
            history,
            Arc::clone(&metrics),
            Weak::new(),
            CancellationToken::new(),
        );
        (handle, task, metrics)
    }

    fn memory_history() -> Arc<InMemoryHistoryStore> {
        Arc::new(InMemoryHistoryStore::new(100))
    }

    async fn join(handle: &RoomHandle, capacity: usize) -> (Uuid, mpsc::Receiver<Payload>) {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity);
        handle
            .register(RoomMember {
                session_id,
                mailbox: tx,
            })
            .await
            .unwrap();
        (session_id, rx)
    }

    struct FailingHistory;

    #[async_trait]
    impl HistoryStore for FailingHistory {
        async fn append(&self, _room: &str, _payload: &str) -> Result<(), RelayError> {
            Err(RelayError::History("store unavailable".to_string()))
        }

        async fn list(&self, _room: &str) -> Result<Vec<String>, RelayError> {
            Err(RelayError::History("store unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_register_and_state() {
        let (handle, _task, metrics) = spawn_room("lobby", memory_history());

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.room, "lobby");
        assert_eq!(state.member_count, 0);
        assert!(matches!(state.lifecycle, RoomLifecycle::Idle { .. }));

        let (_id, _rx) = join(&handle, 8).await;

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.member_count, 1);
        assert_eq!(state.lifecycle, RoomLifecycle::Active);
        assert_eq!(metrics.session_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_order_per_member() {
        let (handle, _task, _metrics) = spawn_room("lobby", memory_history());
        let (_a, mut rx_a) = join(&handle, 64).await;
        let (_b, mut rx_b) = join(&handle, 64).await;

        for i in 0..20 {
            handle.broadcast(format!("msg-{i}")).await.unwrap();
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for i in 0..20 {
                let payload = rx.recv().await.unwrap();
                assert_eq!(&*payload, format!("msg-{i}"));
            }
        }
    }

    #[tokio::test]
    async fn test_broadcast_persists_before_delivery() {
        let history = memory_history();
        let (handle, _task, _metrics) = spawn_room("r1", history.clone());
        let (_id, mut rx) = join(&handle, 8).await;

        handle.broadcast("first".to_string()).await.unwrap();
        let delivered = rx.recv().await.unwrap();

        assert_eq!(&*delivered, "first");
        assert_eq!(history.list("r1").await.unwrap(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_history_failure_still_fans_out() {
        let (handle, _task, metrics) = spawn_room("r1", Arc::new(FailingHistory));
        let (_id, mut rx) = join(&handle, 8).await;

        handle.broadcast("still here".to_string()).await.unwrap();

        assert_eq!(&*rx.recv().await.unwrap(), "still here");
        assert_eq!(metrics.messages_processed(), 1);
    }

    #[tokio::test]
    async fn test_slow_consumer_dropped_and_receives_nothing_more() {
        let (handle, _task, metrics) = spawn_room("r1", memory_history());
        let (_slow, mut slow_rx) = join(&handle, 1).await;
        let (_fast, mut fast_rx) = join(&handle, 64).await;

        // First fills the slow mailbox, second overflows it
        handle.broadcast("one".to_string()).await.unwrap();
        handle.broadcast("two".to_string()).await.unwrap();
        handle.broadcast("three".to_string()).await.unwrap();

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.member_count, 1);
        assert_eq!(metrics.slow_consumer_drops(), 1);

        // Only what was enqueued before the drop, then the mailbox is closed
        assert_eq!(&*slow_rx.recv().await.unwrap(), "one");
        assert!(slow_rx.recv().await.is_none());

        for expected in ["one", "two", "three"] {
            assert_eq!(&*fast_rx.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_unregister_closes_mailbox() {
        let (handle, _task, metrics) = spawn_room("r1", memory_history());
        let (id, mut rx) = join(&handle, 8).await;

        handle.unregister(id).await.unwrap();

        assert!(rx.recv().await.is_none());
        let state = handle.get_state().await.unwrap();
        assert_eq!(state.member_count, 0);
        assert!(matches!(state.lifecycle, RoomLifecycle::Idle { .. }));
        assert_eq!(metrics.session_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_non_member_is_noop() {
        let (handle, _task, metrics) = spawn_room("r1", memory_history());
        let (_id, _rx) = join(&handle, 8).await;

        handle.unregister(Uuid::new_v4()).await.unwrap();
        handle.unregister(Uuid::new_v4()).await.unwrap();

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.member_count, 1);
        assert_eq!(metrics.session_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_member_mailbox_removed_on_broadcast() {
        let (handle, _task, metrics) = spawn_room("r1", memory_history());
        let (_id, rx) = join(&handle, 8).await;
        drop(rx);

        handle.broadcast("anyone?".to_string()).await.unwrap();

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.member_count, 0);
        assert_eq!(metrics.slow_consumer_drops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_room_retires() {
        let (handle, task, metrics) = spawn_room("quiet", memory_history());
        assert_eq!(metrics.room_count(), 1);

        tokio::time::advance(IDLE + Duration::from_secs(1)).await;
        task.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(metrics.room_count(), 0);
        assert!(matches!(
            handle.get_state().await,
            Err(RelayError::RoomClosed(room)) if room == "quiet"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_room_does_not_retire() {
        let (handle, task, _metrics) = spawn_room("busy", memory_history());
        let (id, _rx) = join(&handle, 8).await;

        tokio::time::advance(IDLE * 3).await;
        assert!(!task.is_finished());
        assert_eq!(handle.get_state().await.unwrap().member_count, 1);

        // Idle clock starts from the last departure
        handle.unregister(id).await.unwrap();
        assert_eq!(handle.get_state().await.unwrap().member_count, 0);
        tokio::time::advance(IDLE / 2).await;
        assert!(!handle.is_closed());

        tokio::time::advance(IDLE).await;
        task.await.unwrap();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_cancellation_releases_members() {
        let metrics = ActorMetrics::new();
        let cancel_token = CancellationToken::new();
        let (handle, task) = RoomActor::spawn(
            "r1".to_string(),
            &settings(),
            memory_history(),
            Arc::clone(&metrics),
            Weak::new(),
            cancel_token.clone(),
        );
        let (_id, mut rx) = join(&handle, 8).await;

        cancel_token.cancel();
        task.await.unwrap();

        assert!(rx.recv().await.is_none());
        assert_eq!(metrics.session_count(), 0);
        assert_eq!(metrics.room_count(), 0);
        assert!(matches!(
            handle.register(RoomMember {
                session_id: Uuid::new_v4(),
                mailbox: mpsc::channel(1).0,
            })
            .await,
            Err(RelayError::RoomClosed(_))
        ));
    }
}
