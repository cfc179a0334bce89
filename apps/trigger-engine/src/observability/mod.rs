//! Observability: structured logging, tracing export, and metrics.

pub mod metrics;
pub mod tracing;

pub use metrics::{MetricsError, init_metrics};
pub use tracing::{TracingError, TracingGuard, init_tracing};
