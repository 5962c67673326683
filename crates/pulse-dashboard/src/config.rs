//! Dashboard server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default path of the monitoring configuration document.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Configuration for the dashboard server.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Monitoring configuration, re-read on every metrics request.
    pub config_path: PathBuf,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            cors_origins: Vec::new(),
        }
    }
}

impl DashboardConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the monitoring configuration path.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }
}
