//! Liveness and readiness endpoints.
//!
//! - `GET /health` - the process is up and answering HTTP
//! - `GET /ready` - the service accepts connections; 503 before startup
//!   completes and once shutdown begins
//!
//! Readiness bodies carry the live room and session counts so an operator
//! can see load without scraping `/metrics`.

use crate::actors::ActorMetrics;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Readiness flag for the relay. Liveness needs no state: a process that
/// can answer `/health` is live.
#[derive(Debug)]
pub struct HealthState {
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Not yet ready.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Called when shutdown begins so load balancers stop routing new
    /// connections here.
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct HealthContext {
    health: Arc<HealthState>,
    actors: Arc<ActorMetrics>,
}

/// Readiness response body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub rooms: usize,
    pub sessions: usize,
}

/// Router serving `/health` and `/ready`.
pub fn health_router(health: Arc<HealthState>, actors: Arc<ActorMetrics>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(HealthContext { health, actors })
}

async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

async fn readiness_handler(
    State(ctx): State<HealthContext>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let (status_code, status) = if ctx.health.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status_code,
        Json(ReadinessResponse {
            status,
            rooms: ctx.actors.room_count(),
            sessions: ctx.actors.session_count(),
        }),
    )
}
