//! Liveness and readiness probes.
//!
//! `/health` answers 200 while the process can serve anything at all.
//! `/ready` answers 200 only between binding the listener and the start of
//! a drain, so balancers stop sending new clients before rooms close.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Readiness flag shared by `main`, the test harness and the probe router.
#[derive(Debug, Default)]
pub struct HealthState {
    accepting: AtomicBool,
}

impl HealthState {
    /// Not ready until [`HealthState::set_ready`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }

    /// Called when a drain begins.
    pub fn set_not_ready(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}

/// Router serving `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/ready", get(readiness))
        .with_state(health_state)
}

async fn readiness(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn probe(state: &Arc<HealthState>, uri: &str) -> StatusCode {
        health_router(Arc::clone(state))
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_ready_follows_lifecycle() {
        let state = Arc::new(HealthState::new());
        assert_eq!(probe(&state, "/ready").await, StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready();
        assert_eq!(probe(&state, "/ready").await, StatusCode::OK);

        state.set_not_ready();
        assert_eq!(probe(&state, "/ready").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_is_independent_of_readiness() {
        let state = Arc::new(HealthState::new());
        assert_eq!(probe(&state, "/health").await, StatusCode::OK);

        state.set_ready();
        state.set_not_ready();
        assert_eq!(probe(&state, "/health").await, StatusCode::OK);
        assert_eq!(probe(&state, "/unknown").await, StatusCode::NOT_FOUND);
    }
}
