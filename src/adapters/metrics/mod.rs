//! Metrics and Monitoring Adapters
//!
//! Prometheus metrics, the event-fed health recorder, and the axum
//! observability server (`/live`, `/ready`, `/health`, `/metrics`).
//! Everything here is derived from the engines' event bus; nothing
//! authoritative lives in this layer.

pub mod health;
pub mod prometheus;
pub mod recorder;

pub use health::ObservabilityServer;
pub use prometheus::MetricsRegistry;
pub use recorder::{HealthRecorder, HealthSnapshot};
