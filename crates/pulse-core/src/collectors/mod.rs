//! Source collectors.
//!
//! One collector per [`MetricKind`]. A collector queries its collaborators for
//! one project, classifies what it sees and returns records. It never fails
//! past its own boundary: sub-resource failures become sentinel records or are
//! dropped, depending on the kind.

mod instances;
mod latency;
mod node_pools;
mod pod_restarts;
mod pods;
mod pubsub;
mod url_map;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub use instances::{CPU_METRIC, InstanceUtilizationCollector, STORAGE_METRIC};
pub use latency::{BACKEND_LATENCY_METRIC, LatencyCollector};
pub use node_pools::{NodePoolCollector, REGIONAL_ZONES, evaluate_pool};
pub use pod_restarts::PodRestartCollector;
pub use pods::PodCollector;
pub use pubsub::{OLDEST_UNACKED_METRIC, PubSubCollector, UNDELIVERED_METRIC};
pub use url_map::UrlMapCollector;

use crate::config::CollectionLimits;
use crate::error::{PulseError, Result};
use crate::join::{BranchError, join_isolated};
use crate::source::{PodInfo, Sources};
use crate::types::{ClusterIdentity, CollectorToggles, MetricKind, MetricRecord};

/// Boxed future returned by [`Collector::collect`].
pub type CollectFuture<'a> = Pin<Box<dyn Future<Output = Vec<MetricRecord>> + Send + 'a>>;

/// Everything a collector needs for one project in one cycle.
#[derive(Debug, Clone)]
pub struct CollectContext {
    /// Project being collected.
    pub project_id: String,
    /// Resolved clusters, shared by every cluster-scoped collector.
    pub clusters: Arc<[ClusterIdentity]>,
    /// Collaborators.
    pub sources: Sources,
    /// Cycle bounds.
    pub limits: CollectionLimits,
}

impl CollectContext {
    /// Creates a context.
    pub fn new(
        project_id: impl Into<String>,
        clusters: Vec<ClusterIdentity>,
        sources: Sources,
        limits: CollectionLimits,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            clusters: clusters.into(),
            sources,
            limits,
        }
    }
}

/// A source collector for one metric kind.
pub trait Collector: Send + Sync {
    /// The kind of records this collector produces.
    fn kind(&self) -> MetricKind;

    /// Collects records for the context's project.
    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a>;
}

/// Builds the collector for one kind.
#[must_use]
pub fn collector_for(kind: MetricKind) -> Arc<dyn Collector> {
    match kind {
        MetricKind::UrlMap => Arc::new(UrlMapCollector),
        MetricKind::Pod => Arc::new(PodCollector),
        MetricKind::PubSub => Arc::new(PubSubCollector),
        MetricKind::NodePool => Arc::new(NodePoolCollector),
        MetricKind::PodRestart => Arc::new(PodRestartCollector),
        MetricKind::Latency => Arc::new(LatencyCollector),
        MetricKind::InstanceUtilization => Arc::new(InstanceUtilizationCollector),
    }
}

/// Builds the enabled collector set, in snapshot order.
///
/// Cluster-scoped collectors are left out when `has_clusters` is false.
#[must_use]
pub fn collector_set(toggles: &CollectorToggles, has_clusters: bool) -> Vec<Arc<dyn Collector>> {
    MetricKind::ALL
        .into_iter()
        .filter(|kind| toggles.is_enabled(*kind))
        .filter(|kind| has_clusters || !kind.requires_clusters())
        .map(collector_for)
        .collect()
}

/// Runs a collaborator call under a timeout.
pub(crate) async fn within<T>(
    timeout: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| PulseError::Timeout {
            operation: operation.to_string(),
            after: timeout,
        })?
}

/// Runs `work` once per resolved cluster, each cluster in its own isolated branch.
///
/// Outcomes come back in cluster order.
pub(crate) async fn per_cluster<T, F, Fut>(
    ctx: &CollectContext,
    work: F,
) -> Vec<(ClusterIdentity, std::result::Result<T, BranchError>)>
where
    T: Send + 'static,
    F: Fn(CollectContext, ClusterIdentity) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let branches = ctx
        .clusters
        .iter()
        .map(|cluster| (cluster.clone(), work(ctx.clone(), cluster.clone())))
        .collect();
    join_isolated(branches, ctx.limits.fan_out()).await
}

/// Opens a session on one cluster and lists its pods.
///
/// The session, and the credential material it holds, is dropped before returning.
pub(crate) async fn list_cluster_pods(
    ctx: &CollectContext,
    cluster: &ClusterIdentity,
) -> Result<Vec<PodInfo>> {
    let timeout = ctx.limits.call_timeout();
    let session = within(
        timeout,
        "connect to cluster",
        ctx.sources.clusters.connect(&ctx.project_id, cluster),
    )
    .await?;
    within(timeout, "list pods", session.list_pods()).await
}

/// Last path segment of a resource name (`projects/p/subscriptions/s` → `s`).
pub(crate) fn short_name(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}
