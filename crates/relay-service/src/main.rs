//! Room Relay
//!
//! WebSocket chat relay with per-room fan-out and bounded history.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Connect the history backend (Redis, or in-memory when unset)
//! 5. Create the room registry and token validator
//! 6. Serve HTTP/WebSocket until a shutdown signal arrives
//! 7. Stop room actors, releasing every session

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::secret::ExposeSecret;
use relay_service::actors::{ActorMetrics, RoomRegistry, RoomSettings};
use relay_service::auth::{JwtValidator, TokenValidator};
use relay_service::config::{Config, LogFormat};
use relay_service::history::{HistoryStore, InMemoryHistoryStore, RedisHistoryStore};
use relay_service::observability::{init_metrics_recorder, HealthState};
use relay_service::routes::{self, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long room actors get to release their members on shutdown.
const ROOM_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first: it picks the log format
    let config_result = Config::from_env();
    let log_format = config_result
        .as_ref()
        .map_or(LogFormat::Text, |config| config.log_format);
    init_tracing(log_format);

    info!("Starting Room Relay");

    let config = config_result.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        history_backend = if config.redis_url.is_some() { "redis" } else { "memory" },
        session_mailbox_capacity = config.session_mailbox_capacity,
        room_mailbox_capacity = config.room_mailbox_capacity,
        write_timeout_secs = config.write_timeout.as_secs(),
        room_idle_timeout_secs = config.room_idle_timeout.as_secs(),
        history_limit = config.history_limit,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let history: Arc<dyn HistoryStore> = match &config.redis_url {
        Some(redis_url) => {
            info!("Connecting to Redis...");
            let store =
                RedisHistoryStore::new(redis_url.expose_secret(), config.history_limit).await?;
            info!("Redis connection established");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set, history is kept in memory and lost on restart");
            Arc::new(InMemoryHistoryStore::new(config.history_limit))
        }
    };

    let shutdown_token = CancellationToken::new();
    let health = Arc::new(HealthState::new());
    let actor_metrics = ActorMetrics::new();

    let registry = RoomRegistry::new(
        RoomSettings::from(&config),
        Arc::clone(&history),
        Arc::clone(&actor_metrics),
    );

    let validator: Arc<dyn TokenValidator> = Arc::new(JwtValidator::new(
        &config.jwt_secret,
        config.jwt_clock_skew,
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        e
    })?;

    let state = Arc::new(AppState {
        config,
        registry: registry.clone(),
        history,
        validator,
        health: Arc::clone(&health),
        actor_metrics,
    });

    let app = routes::build_routes(state, prometheus_handle);

    // Bind before reporting ready so bind errors fail startup
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind listener");
        e
    })?;

    let signal_token = shutdown_token.clone();
    let signal_health = Arc::clone(&health);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, initiating graceful shutdown...");
        // Stop receiving new connections from load balancers first
        signal_health.set_not_ready();
        signal_token.cancel();
    });

    health.set_ready();
    info!(addr = %addr, "Room Relay listening");

    let server_token = shutdown_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await?;

    info!(
        rooms = registry.room_count().await,
        "HTTP server stopped, closing rooms"
    );
    registry.shutdown(ROOM_SHUTDOWN_DEADLINE).await;

    info!("Room Relay shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "relay_service=debug,tower_http=debug".into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the service
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
