//! Test server harness for end-to-end testing
//!
//! Provides `TestLcServer` for spawning real controller instances in tests.

use lc_client::{ClientEvents, LiveClassClient};
use lc_service::actors::RoomControllerActorHandle;
use lc_service::config::Config;
use lc_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning a Live Class Controller in end-to-end tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_join_flow() -> Result<(), anyhow::Error> {
///     let server = TestLcServer::spawn().await?;
///     let (client, mut events) = server.connect().await?;
///     client.join_room("class-42", student("s-1")).await?;
///     Ok(())
/// }
/// ```
pub struct TestLcServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestLcServer {
    /// Spawn a server with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(&[]).await
    }

    /// Spawn a server with `overrides` applied on top of the test defaults.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the actor system and HTTP server in the background
    /// - Report ready
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("LC_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("LC_INSTANCE_ID".to_string(), "lc-test".to_string()),
        ]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = AppState::new(config);
        let app = routes::build_routes(Arc::clone(&state));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        state.health.set_ready();

        // Spawn server in background
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

    /// Open a client session against this server.
    pub async fn connect(&self) -> Result<(LiveClassClient, ClientEvents), anyhow::Error> {
        LiveClassClient::connect(&self.ws_url())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect test client: {}", e))
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the WebSocket endpoint URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the shared application state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Get the room controller.
    pub fn controller(&self) -> &RoomControllerActorHandle {
        self.state.hub.controller()
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.state.config
    }
}

impl Drop for TestLcServer {
    fn drop(&mut self) {
        // Stop rooms and open sockets as well as the listener.
        self.state.hub.controller().cancel();
        self._handle.abort();
    }
}
