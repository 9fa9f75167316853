//! HTTP routes for the relay service.
//!
//! Defines the Axum router and application state.

use crate::actors::{ActorMetrics, RoomRegistry};
use crate::auth::TokenValidator;
use crate::config::Config;
use crate::handlers;
use crate::history::HistoryStore;
use crate::observability::{health_router, HealthState};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Room actors by name.
    pub registry: RoomRegistry,

    /// History backend (Redis or in-memory).
    pub history: Arc<dyn HistoryStore>,

    /// Connection token validator.
    pub validator: Arc<dyn TokenValidator>,

    /// Liveness/readiness flags.
    pub health: Arc<HealthState>,

    /// In-process actor counters.
    pub actor_metrics: Arc<ActorMetrics>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/ws` - WebSocket connect (token validated before upgrade)
/// - `/history` - Stored messages for a room
/// - `/health`, `/ready` - Liveness and readiness probes
/// - `/metrics` - Prometheus metrics endpoint
/// - TraceLayer for request logging
/// - 30 second request timeout (upgraded sockets are not affected)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let health_routes = health_router(
        Arc::clone(&state.health),
        Arc::clone(&state.actor_metrics),
    );

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let relay_routes = Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/history", get(handlers::history_handler))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    relay_routes
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
