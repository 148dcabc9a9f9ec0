//! HTTP routes for the Live Class Controller.
//!
//! Defines the Axum router and application state.

use crate::actors::{ActorMetrics, RoomControllerActorHandle, RoomSettings};
use crate::config::Config;
use crate::hub::EventHub;
use crate::observability::{health_router, HealthState};
use crate::transport;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers.
pub struct AppState {
    /// Routes client events to rooms.
    pub hub: EventHub,

    /// Liveness and readiness.
    pub health: Arc<HealthState>,

    /// Service configuration.
    pub config: Config,
}

impl AppState {
    /// Start the actor system for `config` and wrap it in shared state.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        let metrics = ActorMetrics::new();
        let controller = RoomControllerActorHandle::new(
            config.instance_id.clone(),
            Arc::clone(&metrics),
            RoomSettings {
                grace_period: config.room_grace_period(),
                max_participants: config.max_participants_per_room,
            },
            config.max_rooms,
        );

        Arc::new(Self {
            hub: EventHub::new(controller, metrics),
            health: Arc::new(HealthState::new()),
            config,
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/ws` - WebSocket endpoint for clients
/// - `/health` - Liveness probe
/// - `/ready` - Readiness probe (false while draining)
/// - TraceLayer for request logging
///
/// `/metrics` is added by the binary, which owns the Prometheus recorder.
pub fn build_routes(state: Arc<AppState>) -> Router {
    let health = health_router(Arc::clone(&state.health));

    Router::new()
        .route("/ws", get(transport::ws_handler))
        .with_state(state)
        .merge(health)
        .layer(TraceLayer::new_for_http())
}
