//! Observability Server - Liveness, Readiness, Health and Metrics
//!
//! Exposes `/live`, `/ready`, `/health` and `/metrics` via axum 0.7 for
//! Docker health checks and monitoring. Readiness flips to 503 during
//! graceful shutdown; `/health` serves the recorder snapshot plus the
//! current `treasury-burn` lock state as JSON.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use crate::ports::lock_store::LockStore;
use crate::usecases::treasury::TREASURY_BURN_LOCK;

use super::prometheus::MetricsRegistry;
use super::recorder::HealthRecorder;

/// Shared state behind all observability routes.
#[derive(Clone)]
struct ObservabilityState {
    recorder: Arc<HealthRecorder>,
    metrics: Arc<MetricsRegistry>,
    lock_store: Arc<dyn LockStore>,
    ready: watch::Receiver<bool>,
}

/// Axum-based observability HTTP server.
///
/// Polled by external monitoring; nothing the bot does depends on it,
/// and a bind failure at startup is fatal while a handler error is not.
pub struct ObservabilityServer {
    recorder: Arc<HealthRecorder>,
    metrics: Arc<MetricsRegistry>,
    lock_store: Arc<dyn LockStore>,
    ready: watch::Receiver<bool>,
    bind_address: String,
}

impl ObservabilityServer {
    pub fn new(
        recorder: Arc<HealthRecorder>,
        metrics: Arc<MetricsRegistry>,
        lock_store: Arc<dyn LockStore>,
        ready: watch::Receiver<bool>,
        bind_address: String,
    ) -> Self {
        Self {
            recorder,
            metrics,
            lock_store,
            ready,
            bind_address,
        }
    }

    /// Serve until the shutdown signal fires.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let state = ObservabilityState {
            recorder: self.recorder,
            metrics: self.metrics,
            lock_store: self.lock_store,
            ready: self.ready,
        };

        let app = Router::new()
            .route("/live", get(liveness))
            .route("/ready", get(readiness))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!("Observability server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

/// Liveness probe: always 200 while the process runs.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 503 once graceful shutdown has begun.
async fn readiness(State(state): State<ObservabilityState>) -> impl IntoResponse {
    if *state.ready.borrow() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// Full health snapshot: counters, timestamps, balances, lock state.
async fn health(State(state): State<ObservabilityState>) -> impl IntoResponse {
    let snapshot = state.recorder.snapshot();

    let lock = match state.lock_store.peek(TREASURY_BURN_LOCK).await {
        Ok(Some(record)) => serde_json::json!({
            "key": TREASURY_BURN_LOCK,
            "held": !record.is_expired_at(chrono::Utc::now()),
            "holder": record.holder,
            "expires_at": record.expires_at,
        }),
        Ok(None) => serde_json::json!({ "key": TREASURY_BURN_LOCK, "held": false }),
        Err(e) => serde_json::json!({ "key": TREASURY_BURN_LOCK, "error": e.to_string() }),
    };

    Json(serde_json::json!({
        "snapshot": snapshot,
        "lock": lock,
    }))
}

/// Prometheus text exposition.
async fn metrics(State(state): State<ObservabilityState>) -> impl IntoResponse {
    state.metrics.export()
}
