//! Telemetry errors.

use thiserror::Error;

/// Installing a logging subscriber or metrics recorder failed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter did not parse or a subscriber was already installed.
    #[error("cannot install logging: {0}")]
    Logging(String),

    /// The Prometheus recorder could not be built or installed.
    #[error("cannot install metrics recorder: {0}")]
    Metrics(String),
}
