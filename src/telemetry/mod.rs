//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{
    record_cache_retry, record_permission_check, record_role_resolution, record_validate_outcome,
    MetricsState, ValidateOutcome,
};
pub use tracing::{init_telemetry, shutdown_telemetry};
