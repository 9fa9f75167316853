//! `GET /history?room=<name>` - stored messages for a room, oldest first.

use super::room_or_default;
use crate::errors::RelayError;
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub room: Option<String>,
}

/// Handler for `GET /history`.
///
/// Returns the raw stored message blobs as a JSON array of strings. Store
/// failures surface as 500.
#[instrument(skip_all, name = "relay.history.read", fields(room = tracing::field::Empty))]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<String>>, RelayError> {
    let room = room_or_default(params.room.as_deref());
    tracing::Span::current().record("room", room);

    let entries = state.history.list(room).await?;
    Ok(Json(entries))
}
