//! Shared state for the dashboard server.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use pulse_core::Sources;

use crate::config::DashboardConfig;

/// Shared state for the dashboard server.
#[derive(Debug)]
pub struct DashboardState {
    /// Dashboard configuration.
    config: Arc<DashboardConfig>,
    /// Cloud collaborators every snapshot cycle draws on.
    sources: Sources,
    /// Snapshot cycles started since boot.
    cycles: AtomicU64,
    /// Server start time.
    start_time: Instant,
}

impl DashboardState {
    /// Create a new dashboard state.
    pub fn new(config: DashboardConfig, sources: Sources) -> Self {
        Self {
            config: Arc::new(config),
            sources,
            cycles: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Get the cloud collaborators.
    #[must_use]
    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Count a new snapshot cycle and return its sequence number.
    pub fn record_cycle(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of snapshot cycles started.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Server uptime in seconds.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
