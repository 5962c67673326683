//! # pulse-dashboard
//!
//! HTTP API serving cloud health snapshots.
//!
//! Every `GET /api/metrics` re-reads the monitoring configuration and runs one
//! full snapshot cycle through `pulse-core`. Partial failures travel inside the
//! snapshot's `errors` list; the request itself only fails when the
//! configuration cannot be used.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pulse_core::{FakeCloud, Sources};
//! use pulse_dashboard::{DashboardConfig, DashboardServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DashboardConfig::default().with_config_path("config.json");
//!     let server = DashboardServer::new(config, Sources::from_shared(Arc::new(FakeCloud::new())));
//!     // server.serve("0.0.0.0:8000".parse().unwrap()).await.unwrap();
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/` | GET | API name, version and endpoint directory |
//! | `/api/metrics` | GET | One fresh health snapshot |
//! | `/api/health` | GET | Liveness, uptime and cycle count |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use server::DashboardServer;
pub use state::DashboardState;
