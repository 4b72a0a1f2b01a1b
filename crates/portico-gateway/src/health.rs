//! Liveness and readiness.
//!
//! The gateway moves through three phases: `starting` until the listener
//! is bound, `serving`, then `draining` once shutdown begins. Readiness
//! additionally needs a non-empty route table.

use crate::state::RouteSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Configuration loaded, listener not yet serving.
    Starting,
    /// Accepting connections.
    Serving,
    /// Shutdown started; open connections are finishing.
    Draining,
}

impl Phase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Serving,
            _ => Self::Draining,
        }
    }
}

/// Body of `/_portico/health`.
#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
    /// Current phase.
    pub phase: Phase,
    /// Seconds since the process started.
    pub uptime_seconds: u64,
    /// Gateway version.
    pub version: &'static str,
}

/// Body of `/_portico/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    /// Whether load balancers should send traffic.
    pub ready: bool,
    /// Current phase.
    pub phase: Phase,
    /// Routes in the live table.
    pub routes: usize,
    /// When the live table was built.
    pub loaded_at: DateTime<Utc>,
}

/// Shared lifecycle state behind the health endpoints.
#[derive(Debug)]
pub struct HealthChecker {
    started: Instant,
    phase: AtomicU8,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    /// Creates a checker in [`Phase::Starting`].
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            phase: AtomicU8::new(Phase::Starting as u8),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Moves to [`Phase::Serving`]. Has no effect once draining.
    pub fn mark_serving(&self) {
        let _ = self.phase.compare_exchange(
            Phase::Starting as u8,
            Phase::Serving as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Moves to [`Phase::Draining`]. Final.
    pub fn begin_drain(&self) {
        self.phase.store(Phase::Draining as u8, Ordering::SeqCst);
    }

    /// Returns whether the gateway is serving.
    pub fn is_serving(&self) -> bool {
        self.phase() == Phase::Serving
    }

    /// Returns whether shutdown has started.
    pub fn is_draining(&self) -> bool {
        self.phase() == Phase::Draining
    }

    /// Returns the time since start.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Liveness report. The process is live in every phase.
    pub fn liveness(&self) -> Liveness {
        Liveness {
            phase: self.phase(),
            uptime_seconds: self.uptime().as_secs(),
            version: crate::VERSION,
        }
    }

    /// Readiness report against the live route table.
    pub fn readiness(&self, snapshot: &RouteSnapshot) -> Readiness {
        Readiness {
            ready: self.is_serving() && !snapshot.table().is_empty(),
            phase: self.phase(),
            routes: snapshot.table().len(),
            loaded_at: snapshot.loaded_at(),
        }
    }
}
