//! # pulse-gcp
//!
//! Google Cloud REST adapters for the pulse aggregation engine.
//!
//! [`GcpCloud`] implements every collaborator contract of `pulse-core`:
//!
//! - **Resources**: clusters and node pools (Kubernetes Engine), URL maps
//!   (Compute Engine), subscriptions (Pub/Sub), instances (Spanner)
//! - **Metrics**: `timeSeries.list` on Cloud Monitoring
//! - **Cluster sessions**: pod listings straight from each cluster's API server
//! - **Probes**: plain HTTPS GETs against load-balancer hostnames
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pulse_core::{MonitorConfig, SnapshotBuilder, Sources};
//! use pulse_gcp::{GcpCloud, TokenProvider};
//!
//! #[tokio::main]
//! async fn main() -> pulse_core::Result<()> {
//!     let cloud = GcpCloud::new(Arc::new(TokenProvider::from_env()))?;
//!     let config = MonitorConfig::load("config.json").await?;
//!     let snapshot = SnapshotBuilder::from_config(Sources::from_shared(Arc::new(cloud)), &config).await;
//!     println!("{} errors", snapshot.errors.len());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod kube;
pub mod monitoring;
pub mod probe;
pub mod resources;

use std::sync::Arc;
use std::time::Duration;

use pulse_core::Result;
use pulse_core::source::{HttpProber, SourceFuture};

pub use auth::{TokenProvider, TokenSource};
pub use client::{Endpoints, GcpClient};
pub use kube::KubeSession;
pub use probe::{DEFAULT_PROBE_TIMEOUT, ReqwestProber};

/// Google Cloud implementation of every collaborator contract.
#[derive(Debug, Clone)]
pub struct GcpCloud {
    client: GcpClient,
    prober: ReqwestProber,
}

impl GcpCloud {
    /// Creates an adapter using the default endpoints and probe timeout.
    pub fn new(tokens: Arc<TokenProvider>) -> Result<Self> {
        Ok(Self {
            client: GcpClient::new(tokens)?,
            prober: ReqwestProber::new(DEFAULT_PROBE_TIMEOUT)?,
        })
    }

    /// Overrides the API base URLs.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.client = self.client.with_endpoints(endpoints);
        self
    }

    /// Replaces the prober with one bounded by `timeout`.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.prober = ReqwestProber::new(timeout)?;
        Ok(self)
    }

    /// The underlying API client.
    #[must_use]
    pub fn client(&self) -> &GcpClient {
        &self.client
    }
}

impl HttpProber for GcpCloud {
    fn probe<'a>(&'a self, url: &'a str) -> SourceFuture<'a, u16> {
        self.prober.probe(url)
    }
}
