//! Live Class Controller
//!
//! WebSocket server for live-class rooms: presence, chat, hand raises and
//! stream signaling.
//!
//! # Endpoints
//!
//! - `GET /ws` - client WebSocket
//! - `GET /health`, `GET /ready` - liveness and readiness
//! - `GET /metrics` - Prometheus metrics
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Initialize actor system (`RoomControllerActorHandle`)
//! 5. Bind the listener and mark ready
//! 6. Serve until SIGTERM/Ctrl+C, then drain

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use lc_service::config::{Config, LogFormat};
use lc_service::observability::init_metrics_recorder;
use lc_service::routes::{build_routes, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The format is read before the rest of the configuration so that
    // configuration errors are logged in it.
    let json_logs = std::env::var("LC_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        == Some(LogFormat::Json);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lc_service=debug,tower_http=debug".into());
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Live Class Controller");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        room_grace_period_seconds = config.room_grace_period_seconds,
        max_rooms = config.max_rooms,
        max_participants_per_room = config.max_participants_per_room,
        max_frame_bytes = config.max_frame_bytes,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded.
    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;
    let shutdown_timeout = config.shutdown_timeout();

    info!("Initializing actor system...");
    let state = AppState::new(config);
    let controller = state.hub.controller().clone();
    let health_state = Arc::clone(&state.health);
    info!("Actor system initialized");

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let app = build_routes(state).merge(metrics_router);

    // Bind before marking ready to fail fast on bind errors.
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind listener");
        format!("Failed to bind to {addr}: {e}")
    })?;
    health_state.set_ready();
    info!(addr = %addr, "Live Class Controller listening - press Ctrl+C to shutdown");

    let server_token = controller.child_token();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_token.cancelled().await;
    });
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(error = %e, "Server failed");
        }
    });

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    // Stop routing new clients here first.
    health_state.set_not_ready();

    // Refuses new rooms and cancels rooms, connections and the server.
    if let Err(e) = controller.shutdown(shutdown_timeout).await {
        warn!(error = %e, "Actor system shutdown error");
        controller.cancel();
    }

    if tokio::time::timeout(shutdown_timeout, server_task)
        .await
        .is_err()
    {
        warn!(
            timeout_secs = shutdown_timeout.as_secs(),
            "Server did not stop before the shutdown deadline"
        );
    }

    info!("Live Class Controller shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or Ctrl+C.
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
