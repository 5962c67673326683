//! # pulse-core
//!
//! Concurrent health aggregation engine for cloud resources.
//!
//! A snapshot cycle fans out over every configured project, and within each
//! project over seven source collectors. Each collector fans out again over its
//! sub-resources (clusters, hostnames, subscriptions, instances). Every level
//! runs through [`join_isolated`], so one failing branch never costs its
//! siblings their results.
//!
//! ## Features
//!
//! - **Classifier**: per-metric threshold band tables mapping measurements to
//!   the closed [`Status`] vocabulary
//! - **Collectors**: URL map probes, pod phases, Pub/Sub backlog, node pool
//!   headroom, pod restarts, backend latency, instance utilization
//! - **Failure isolation**: sentinel records, skipped sub-resources, and
//!   [`CollectionFailure`] entries instead of aborted cycles
//! - **Collaborator traits**: cloud APIs are consumed through [`source`], with
//!   an in-memory [`FakeCloud`] for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pulse_core::{FakeCloud, MonitorConfig, SnapshotBuilder, Sources};
//!
//! #[tokio::main]
//! async fn main() -> pulse_core::Result<()> {
//!     let config = MonitorConfig::load("config.json").await?;
//!     let sources = Sources::from_shared(Arc::new(FakeCloud::new()));
//!     let snapshot = SnapshotBuilder::from_config(sources, &config).await;
//!     println!("{} records, {} errors", snapshot.record_count(), snapshot.errors.len());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod classify;
pub mod collectors;
pub mod config;
pub mod error;
pub mod fake;
pub mod join;
pub mod resolver;
pub mod snapshot;
pub mod source;
pub mod types;

pub use aggregate::{ProjectAggregator, ProjectReport};
pub use classify::{Observation, PolicyKind, ThresholdPolicy, classify};
pub use collectors::{CollectContext, Collector};
pub use config::{CollectionLimits, MonitorConfig};
pub use error::{PulseError, Result};
pub use fake::FakeCloud;
pub use join::{BranchError, JoinOptions, join_isolated};
pub use resolver::ClusterResolver;
pub use snapshot::{NO_PROJECTS, Snapshot, SnapshotBuilder};
pub use source::{
    ClusterAccess, ClusterSession, HttpProber, MetricsApi, ResourceApi, Sources, TimeSeriesQuery,
};
pub use types::{
    ClusterIdentity, ClusterKind, CollectionFailure, CollectorToggles, MetricKind, MetricRecord,
    ProjectScope, Status,
};
