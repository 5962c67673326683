//! Dashboard server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use pulse_core::Sources;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::routes::create_router;
use crate::state::DashboardState;

/// Dashboard server for the status API.
#[derive(Debug, Clone)]
pub struct DashboardServer {
    state: Arc<DashboardState>,
}

impl DashboardServer {
    /// Create a new dashboard server over the given cloud collaborators.
    #[must_use]
    pub fn new(config: DashboardConfig, sources: Sources) -> Self {
        Self {
            state: Arc::new(DashboardState::new(config, sources)),
        }
    }

    /// Get the dashboard state for external access.
    #[must_use]
    pub fn state(&self) -> Arc<DashboardState> {
        self.state.clone()
    }

    /// Start the dashboard server and listen for connections.
    ///
    /// This method runs until the server encounters a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self, addr: SocketAddr) -> DashboardResult<()> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Start the dashboard server with graceful shutdown support.
    ///
    /// The server will shut down when the provided future completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> DashboardResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DashboardError::BindFailed(addr, e))?;

        let local = listener.local_addr().unwrap_or(addr);
        info!(addr = %local, config = %self.state.config().config_path.display(), "Dashboard server listening");

        let router = create_router(self.state.clone());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| DashboardError::Internal(e.to_string()))?;

        info!(cycles = self.state.cycles(), "Dashboard server shut down");
        Ok(())
    }

    /// Create the router without starting the server.
    ///
    /// Useful for testing or embedding in another server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}
