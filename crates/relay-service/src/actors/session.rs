//! `ClientSession` - the two loops serving one WebSocket connection.
//!
//! - Read loop: socket -> decode -> stamp identity/room/time -> room mailbox
//! - Write loop: outbound mailbox -> socket, one frame per payload, each
//!   under the write deadline
//!
//! Whichever loop ends first stops the other through a shared
//! `CancellationToken`. The session then unregisters from its room exactly
//! once, waits for the write loop and closes the socket.

use super::messages::Payload;
use super::room::RoomHandle;
use crate::models::ChatMessage;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// Close frame or end of stream.
    ClientClosed,
    ReadError,
    /// The write loop ended first.
    WriterStopped,
    /// The room actor is gone.
    RoomClosed,
}

/// Why the write loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEnd {
    /// The room dropped this member (unregistered, slow consumer, shutdown).
    MailboxClosed,
    WriteError,
    WriteTimeout,
    /// The read loop ended first.
    ReaderStopped,
}

impl ReadEnd {
    const fn as_str(self) -> &'static str {
        match self {
            ReadEnd::ClientClosed => "client_closed",
            ReadEnd::ReadError => "read_error",
            ReadEnd::WriterStopped => "writer_stopped",
            ReadEnd::RoomClosed => "room_closed",
        }
    }
}

impl WriteEnd {
    const fn as_str(self) -> &'static str {
        match self {
            WriteEnd::MailboxClosed => "mailbox_closed",
            WriteEnd::WriteError => "write_error",
            WriteEnd::WriteTimeout => "write_timeout",
            WriteEnd::ReaderStopped => "reader_stopped",
        }
    }
}

/// A registered connection.
pub struct ClientSession {
    session_id: Uuid,
    user_id: String,
    room: RoomHandle,
    write_timeout: Duration,
}

impl ClientSession {
    /// `room` must already have this session registered under `session_id`.
    #[must_use]
    pub fn new(session_id: Uuid, user_id: String, room: RoomHandle, write_timeout: Duration) -> Self {
        Self {
            session_id,
            user_id,
            room,
            write_timeout,
        }
    }

    /// Serve the connection until either direction ends.
    pub async fn run(self, socket: WebSocket, outbound: mpsc::Receiver<Payload>) {
        let (sink, stream) = socket.split();
        self.run_with(stream, sink, outbound).await;
    }

    /// Serve over an already split connection.
    #[instrument(
        skip_all,
        name = "relay.actor.session",
        fields(session_id = %self.session_id, room = %self.room.room())
    )]
    pub async fn run_with<S, W>(self, stream: S, sink: W, outbound: mpsc::Receiver<Payload>)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: fmt::Display + Send,
    {
        debug!(target: "relay.actor.session", session_id = %self.session_id, "Session started");

        let stop = CancellationToken::new();
        let writer = tokio::spawn(write_loop(
            sink,
            outbound,
            self.write_timeout,
            stop.clone(),
        ));

        let read_end = self.read_loop(stream, &stop).await;

        // Single teardown path for both directions
        if let Err(e) = self.room.unregister(self.session_id).await {
            debug!(
                target: "relay.actor.session",
                session_id = %self.session_id,
                error = %e,
                "Room already gone at unregister"
            );
        }
        stop.cancel();

        let write_end = match writer.await {
            Ok(end) => Some(end),
            Err(e) => {
                warn!(
                    target: "relay.actor.session",
                    session_id = %self.session_id,
                    error = ?e,
                    "Write loop task failed"
                );
                None
            }
        };

        debug!(
            target: "relay.actor.session",
            session_id = %self.session_id,
            read_end = read_end.as_str(),
            write_end = write_end.map_or("unknown", WriteEnd::as_str),
            "Session ended"
        );
    }

    async fn read_loop<S>(&self, mut stream: S, stop: &CancellationToken) -> ReadEnd
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        loop {
            let frame = tokio::select! {
                () = stop.cancelled() => return ReadEnd::WriterStopped,
                frame = stream.next() => frame,
            };

            let data = match frame {
                None | Some(Ok(Message::Close(_))) => return ReadEnd::ClientClosed,
                Some(Err(e)) => {
                    debug!(
                        target: "relay.actor.session",
                        session_id = %self.session_id,
                        error = %e,
                        "Socket read failed"
                    );
                    return ReadEnd::ReadError;
                }
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Binary(bytes))) => bytes,
                // Pongs are answered by the socket layer
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            };

            let now = chrono::Utc::now().timestamp();
            let payload = match ChatMessage::from_client(&data, &self.user_id, self.room.room(), now)
                .and_then(|message| message.to_payload())
            {
                Ok(payload) => payload,
                Err(e) => {
                    debug!(
                        target: "relay.actor.session",
                        session_id = %self.session_id,
                        error = %e,
                        "Dropping undecodable frame"
                    );
                    continue;
                }
            };

            // Waits for room mailbox capacity
            tokio::select! {
                () = stop.cancelled() => return ReadEnd::WriterStopped,
                result = self.room.broadcast(payload) => {
                    if result.is_err() {
                        return ReadEnd::RoomClosed;
                    }
                }
            }
        }
    }
}

async fn write_loop<W>(
    mut sink: W,
    mut outbound: mpsc::Receiver<Payload>,
    write_timeout: Duration,
    stop: CancellationToken,
) -> WriteEnd
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display + Send,
{
    let end = loop {
        let payload = tokio::select! {
            () = stop.cancelled() => break WriteEnd::ReaderStopped,
            payload = outbound.recv() => match payload {
                Some(payload) => payload,
                None => break WriteEnd::MailboxClosed,
            },
        };

        match tokio::time::timeout(write_timeout, sink.send(Message::Text(payload.to_string())))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(target: "relay.actor.session", error = %e, "Socket write failed");
                break WriteEnd::WriteError;
            }
            Err(_) => {
                warn!(
                    target: "relay.actor.session",
                    timeout_secs = write_timeout.as_secs(),
                    "Socket write deadline exceeded"
                );
                break WriteEnd::WriteTimeout;
            }
        }
    };

    stop.cancel();

    // Best effort; the peer may already be gone
    if end != WriteEnd::WriteTimeout {
        let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
    }
    let _ = tokio::time::timeout(write_timeout, sink.close()).await;

    end
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::{ActorMetrics, RoomRegistry, RoomSettings};
    use crate::history::{HistoryStore, InMemoryHistoryStore};
    use futures::channel::mpsc as fmpsc;
    use std::convert::Infallible;
    use std::sync::Arc;

    const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

    struct Fixture {
        registry: RoomRegistry,
        history: Arc<InMemoryHistoryStore>,
        metrics: Arc<ActorMetrics>,
    }

    fn fixture() -> Fixture {
        let history = Arc::new(InMemoryHistoryStore::new(100));
        let metrics = ActorMetrics::new();
        let registry = RoomRegistry::new(
            RoomSettings {
                mailbox_capacity: 64,
                idle_timeout: Duration::from_secs(300),
            },
            history.clone(),
            Arc::clone(&metrics),
        );
        Fixture {
            registry,
            history,
            metrics,
        }
    }

    type Inbound = fmpsc::UnboundedSender<Result<Message, axum::Error>>;

    /// Join `room` as `user_id` and run the session over in-memory channels.
    async fn start_session(
        fixture: &Fixture,
        room: &str,
        user_id: &str,
    ) -> (
        Inbound,
        fmpsc::UnboundedReceiver<Message>,
        tokio::task::JoinHandle<()>,
    ) {
        let session_id = Uuid::new_v4();
        let (handle, outbound) = fixture
            .registry
            .join(room, session_id, 8)
            .await
            .unwrap();

        let (inbound_tx, inbound_rx) = fmpsc::unbounded();
        let (sink_tx, sink_rx) = fmpsc::unbounded();

        let session = ClientSession::new(session_id, user_id.to_string(), handle, WRITE_TIMEOUT);
        let task = tokio::spawn(session.run_with(inbound_rx, sink_tx, outbound));

        (inbound_tx, sink_rx, task)
    }

    async fn next_text(frames: &mut fmpsc::UnboundedReceiver<Message>) -> ChatMessage {
        loop {
            match frames.next().await.expect("socket closed") {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    async fn member_count(fixture: &Fixture, room: &str) -> usize {
        let handle = fixture.registry.get_or_create(room).await;
        handle.get_state().await.unwrap().member_count
    }

    #[tokio::test]
    async fn test_message_stamped_with_session_identity() {
        let fixture = fixture();
        let (alice_in, _alice_out, _alice) = start_session(&fixture, "r1", "alice").await;
        let (_bob_in, mut bob_out, _bob) = start_session(&fixture, "r1", "bob").await;

        alice_in
            .unbounded_send(Ok(Message::Text(
                r#"{"user_id":"mallory","room":"admin","content":"hello","time":1}"#.to_string(),
            )))
            .unwrap();

        let received = next_text(&mut bob_out).await;
        assert_eq!(received.user_id, "alice");
        assert_eq!(received.room, "r1");
        assert_eq!(received.content, "hello");
        assert!(received.time > 1);
    }

    #[tokio::test]
    async fn test_binary_frames_accepted() {
        let fixture = fixture();
        let (alice_in, mut alice_out, _alice) = start_session(&fixture, "r1", "alice").await;

        alice_in
            .unbounded_send(Ok(Message::Binary(br#"{"content":"bytes"}"#.to_vec())))
            .unwrap();

        assert_eq!(next_text(&mut alice_out).await.content, "bytes");
    }

    #[tokio::test]
    async fn test_malformed_frame_dropped_connection_stays_open() {
        let fixture = fixture();
        let (alice_in, mut alice_out, alice) = start_session(&fixture, "r1", "alice").await;

        alice_in
            .unbounded_send(Ok(Message::Text("not json".to_string())))
            .unwrap();
        alice_in
            .unbounded_send(Ok(Message::Text(r#"{"content":42}"#.to_string())))
            .unwrap();
        alice_in
            .unbounded_send(Ok(Message::Text(r#"{"content":"ok"}"#.to_string())))
            .unwrap();

        assert_eq!(next_text(&mut alice_out).await.content, "ok");
        assert!(!alice.is_finished());
        assert_eq!(fixture.history.list("r1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_client_close_unregisters() {
        let fixture = fixture();
        let (alice_in, _alice_out, alice) = start_session(&fixture, "r1", "alice").await;
        assert_eq!(member_count(&fixture, "r1").await, 1);

        alice_in.unbounded_send(Ok(Message::Close(None))).unwrap();
        alice.await.unwrap();

        assert_eq!(member_count(&fixture, "r1").await, 0);
        assert_eq!(fixture.metrics.session_count(), 0);
    }

    #[tokio::test]
    async fn test_read_error_unregisters() {
        let fixture = fixture();
        let (alice_in, _alice_out, alice) = start_session(&fixture, "r1", "alice").await;

        alice_in
            .unbounded_send(Err(axum::Error::new("connection reset")))
            .unwrap();
        alice.await.unwrap();

        assert_eq!(member_count(&fixture, "r1").await, 0);
    }

    #[tokio::test]
    async fn test_write_failure_ends_session_and_unregisters() {
        let fixture = fixture();
        let (_alice_in, alice_out, alice) = start_session(&fixture, "r1", "alice").await;
        let (bob_in, _bob_out, _bob) = start_session(&fixture, "r1", "bob").await;

        // Alice's socket is gone; the next delivery fails in her write loop
        drop(alice_out);
        bob_in
            .unbounded_send(Ok(Message::Text(r#"{"content":"ping"}"#.to_string())))
            .unwrap();

        alice.await.unwrap();

        assert_eq!(member_count(&fixture, "r1").await, 1);
        assert_eq!(fixture.metrics.session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_deadline_ends_session() {
        let fixture = fixture();
        let session_id = Uuid::new_v4();
        let (handle, outbound) = fixture
            .registry
            .join("r1", session_id, 8)
            .await
            .unwrap();

        // A socket that never finishes a write
        let stuck = futures::sink::unfold((), |(), _message: Message| {
            futures::future::pending::<Result<(), Infallible>>()
        });
        let stuck = Box::pin(stuck);
        let (_inbound_tx, inbound_rx) = fmpsc::unbounded::<Result<Message, axum::Error>>();

        let session = ClientSession::new(
            session_id,
            "alice".to_string(),
            handle.clone(),
            WRITE_TIMEOUT,
        );
        let task = tokio::spawn(session.run_with(inbound_rx, stuck, outbound));

        handle.broadcast("stalls".to_string()).await.unwrap();
        task.await.unwrap();

        assert_eq!(handle.get_state().await.unwrap().member_count, 0);
    }

    #[tokio::test]
    async fn test_room_drop_ends_session() {
        let fixture = fixture();
        let (_alice_in, mut alice_out, alice) = start_session(&fixture, "r1", "alice").await;

        fixture.registry.shutdown(Duration::from_secs(5)).await;
        alice.await.unwrap();

        // Close frame sent on the way out
        let mut saw_close = false;
        while let Some(frame) = alice_out.next().await {
            if matches!(frame, Message::Close(_)) {
                saw_close = true;
            }
        }
        assert!(saw_close);
    }
}
