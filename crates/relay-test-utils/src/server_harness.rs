//! Test server harness for E2E testing
//!
//! Provides `TestRelayServer` for spawning real relay instances in tests.

use crate::token_builders::TEST_JWT_SECRET;
use metrics_exporter_prometheus::PrometheusBuilder;
use relay_service::actors::{ActorMetrics, RoomRegistry, RoomSettings};
use relay_service::auth::JwtValidator;
use relay_service::config::Config;
use relay_service::history::{HistoryStore, InMemoryHistoryStore};
use relay_service::observability::HealthState;
use relay_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Test harness for spawning the relay in E2E tests.
///
/// Uses in-memory history and signs nothing itself; pair it with
/// `TestTokenBuilder`, which shares its secret.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_history_e2e() -> Result<(), anyhow::Error> {
///     let server = TestRelayServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/history", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRelayServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestRelayServer {
    /// Spawn a server with default settings.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(HashMap::new()).await
    }

    /// Spawn a server with extra `RELAY_*` variables layered over the
    /// test defaults.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Keep history in memory
    /// - Report ready once listening
    pub async fn spawn_with(overrides: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("RELAY_JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
            ("RELAY_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let history: Arc<dyn HistoryStore> =
            Arc::new(InMemoryHistoryStore::new(config.history_limit));
        let actor_metrics = ActorMetrics::new();
        let registry = RoomRegistry::new(
            RoomSettings::from(&config),
            Arc::clone(&history),
            Arc::clone(&actor_metrics),
        );
        let validator = Arc::new(JwtValidator::new(&config.jwt_secret, config.jwt_clock_skew));
        let health = Arc::new(HealthState::new());

        let state = Arc::new(AppState {
            config,
            registry,
            history,
            validator,
            health: Arc::clone(&health),
            actor_metrics,
        });

        // A local recorder handle; the global recorder is left untouched so
        // several servers can run in one test binary
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(Arc::clone(&state), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        health.set_ready();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket connect URL for `token` and `room`.
    pub fn ws_url(&self, token: &str, room: &str) -> String {
        format!("ws://{}/ws?token={}&room={}", self.addr, token, room)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state (registry, history, counters).
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Wait until `room` has `count` members, polling its actor.
    ///
    /// Registration completes after the upgrade response, so tests that
    /// send right after connecting wait here first.
    pub async fn wait_for_members(&self, room: &str, count: usize) -> Result<(), anyhow::Error> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let handle = self.state.registry.get_or_create(room).await;
            if let Ok(state) = handle.get_state().await {
                if state.member_count == count {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("room {room} did not reach {count} members");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestRelayServer {
    fn drop(&mut self) {
        // Explicitly abort the HTTP server task when the test completes.
        // Room actors end with the test runtime.
        self._handle.abort();
    }
}
