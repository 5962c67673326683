//! Snapshot assembly across projects.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::aggregate::{ProjectAggregator, ProjectReport};
use crate::config::{CollectionLimits, MonitorConfig};
use crate::error::PulseError;
use crate::join::{JoinOptions, join_isolated};
use crate::source::Sources;
use crate::types::{
    CollectionFailure, InstanceUtilizationRecord, LatencyRecord, MetricRecord, NodePoolRecord,
    PodRecord, PodRestartRecord, ProjectScope, PubSubRecord, UrlMapRecord,
};

/// Error reported when the configuration lists no projects.
pub const NO_PROJECTS: &str = "No projects configured in config.json";

/// The merged view of every project for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// URL map probe results.
    pub url_maps: Vec<UrlMapRecord>,
    /// Non-running pods.
    pub pods: Vec<PodRecord>,
    /// Aged Pub/Sub backlogs.
    pub pubsub: Vec<PubSubRecord>,
    /// Node pools near their maximum.
    pub node_pools: Vec<NodePoolRecord>,
    /// Pods restarting too often.
    pub pod_restarts: Vec<PodRestartRecord>,
    /// Slow backends.
    pub latency: Vec<LatencyRecord>,
    /// Instance utilization.
    pub spanner: Vec<InstanceUtilizationRecord>,
    /// When the cycle started.
    pub timestamp: DateTime<Utc>,
    /// Collector, project and configuration failures.
    pub errors: Vec<CollectionFailure>,
}

impl Snapshot {
    /// An empty snapshot stamped with `timestamp`.
    #[must_use]
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            url_maps: Vec::new(),
            pods: Vec::new(),
            pubsub: Vec::new(),
            node_pools: Vec::new(),
            pod_restarts: Vec::new(),
            latency: Vec::new(),
            spanner: Vec::new(),
            timestamp,
            errors: Vec::new(),
        }
    }

    /// Appends a record to the list for its kind.
    pub fn push(&mut self, record: MetricRecord) {
        match record {
            MetricRecord::UrlMap(r) => self.url_maps.push(r),
            MetricRecord::Pod(r) => self.pods.push(r),
            MetricRecord::PubSub(r) => self.pubsub.push(r),
            MetricRecord::NodePool(r) => self.node_pools.push(r),
            MetricRecord::PodRestart(r) => self.pod_restarts.push(r),
            MetricRecord::Latency(r) => self.latency.push(r),
            MetricRecord::InstanceUtilization(r) => self.spanner.push(r),
        }
    }

    /// Merges one project's report.
    pub fn merge(&mut self, report: ProjectReport) {
        for record in report.records {
            self.push(record);
        }
        self.errors.extend(report.failures);
    }

    /// Total records across every list.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.url_maps.len()
            + self.pods.len()
            + self.pubsub.len()
            + self.node_pools.len()
            + self.pod_restarts.len()
            + self.latency.len()
            + self.spanner.len()
    }
}

/// Builds snapshots from project scopes.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    sources: Sources,
    limits: CollectionLimits,
}

impl SnapshotBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(sources: Sources, limits: CollectionLimits) -> Self {
        Self { sources, limits }
    }

    /// Builds a snapshot for every project of a configuration document.
    pub async fn from_config(sources: Sources, config: &MonitorConfig) -> Snapshot {
        Self::new(sources, config.limits).build(&config.projects).await
    }

    /// Aggregates every project concurrently and merges the reports in
    /// project order.
    pub async fn build(&self, projects: &[ProjectScope]) -> Snapshot {
        let started = Utc::now();
        let cycle_id = Uuid::new_v4();
        let span = info_span!("snapshot", cycle_id = %cycle_id, projects = projects.len());
        self.build_at(started, projects).instrument(span).await
    }

    async fn build_at(&self, started: DateTime<Utc>, projects: &[ProjectScope]) -> Snapshot {
        let mut snapshot = Snapshot::empty(started);
        if projects.is_empty() {
            snapshot.errors.push(CollectionFailure::configuration(NO_PROJECTS));
            info!("no projects configured");
            return snapshot;
        }
        info!("snapshot cycle started");

        let aggregator = ProjectAggregator::new(self.sources.clone(), self.limits);
        let branches = projects
            .iter()
            .map(|scope| {
                let aggregator = aggregator.clone();
                let project_id = scope.project_id.clone();
                let scope = scope.clone();
                let branch = async move { Ok::<_, PulseError>(aggregator.aggregate(&scope).await) }
                    .in_current_span();
                (project_id, branch)
            })
            .collect::<Vec<_>>();
        let options = JoinOptions::new(self.limits.project_timeout(), self.limits.max_concurrency);

        for (project_id, outcome) in join_isolated(branches, options).await {
            match outcome {
                Ok(report) => snapshot.merge(report),
                Err(err) => {
                    warn!(project = %project_id, error = %err, "project failed");
                    snapshot
                        .errors
                        .push(CollectionFailure::project(project_id, err.to_string()));
                }
            }
        }

        info!(
            records = snapshot.record_count(),
            errors = snapshot.errors.len(),
            "snapshot cycle finished"
        );
        snapshot
    }
}
