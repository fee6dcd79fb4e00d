//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{record_delivery, record_guard_decision, DeliveryOutcome, MetricsState};
pub use tracing::init_telemetry;
