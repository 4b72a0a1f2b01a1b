//! Observability for the Portico gateway.
//!
//! - **Logging**: `tracing` events rendered as JSON (production) or pretty
//!   text (development), filtered by `RUST_LOG` or the configured level
//! - **Metrics**: the `metrics` facade backed by a Prometheus recorder; the
//!   gateway renders it at `/_portico/metrics`
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `portico_requests_total` | Counter | `route`, `status` |
//! | `portico_request_duration_seconds` | Histogram | `route` |
//! | `portico_in_flight_requests` | Gauge | - |
//! | `portico_auth_rejections_total` | Counter | `kind`, `reason` |
//! | `portico_doc_rewrite_failures_total` | Counter | `route` |
//! | `portico_route_table_reloads_total` | Counter | `outcome` |
//!
//! Recording before [`init_metrics`] is a no-op, so library code can record
//! unconditionally.

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, InFlightGuard, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
