//! `GET /ws?token=<jwt>&room=<name>` - WebSocket connect.
//!
//! The token is validated before the upgrade; a rejected token never
//! reaches the room layer. After the upgrade the connection joins its room
//! and is served by a `ClientSession` until either side goes away.

use super::room_or_default;
use crate::actors::ClientSession;
use crate::observability::metrics;
use crate::routes::AppState;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Missing tokens fail validation like any other bad token.
    #[serde(default)]
    pub token: String,
    pub room: Option<String>,
}

/// Handler for `GET /ws`.
///
/// The upgrade extractor is taken as a `Result` so that authentication is
/// decided first: a bad token is a 401 whether or not the request was a
/// proper WebSocket handshake.
#[instrument(skip_all, name = "relay.ws.connect")]
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user_id = match state.validator.validate(&params.token).await {
        Ok(user_id) => user_id,
        Err(e) => {
            metrics::record_auth_rejection();
            return e.into_response();
        }
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let room = room_or_default(params.room.as_deref()).to_string();
    let session_id = Uuid::new_v4();
    let registry = state.registry.clone();
    let mailbox_capacity = state.config.session_mailbox_capacity;
    let write_timeout = state.config.write_timeout;

    tracing::debug!(
        target: "relay.ws",
        session_id = %session_id,
        room = %room,
        "Connection authenticated, upgrading"
    );

    upgrade.on_upgrade(move |socket| async move {
        match registry
            .join(&room, session_id, mailbox_capacity)
            .await
        {
            Ok((handle, outbound)) => {
                ClientSession::new(session_id, user_id, handle, write_timeout)
                    .run(socket, outbound)
                    .await;
            }
            Err(e) => {
                warn!(
                    target: "relay.ws",
                    session_id = %session_id,
                    room = %room,
                    error = %e,
                    "Could not join room, closing connection"
                );
                let _ = socket.close().await;
            }
        }
    })
}
