//! Per-project aggregation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::collectors::{CollectContext, collector_set};
use crate::config::CollectionLimits;
use crate::error::PulseError;
use crate::join::{JoinOptions, join_isolated};
use crate::resolver::ClusterResolver;
use crate::source::Sources;
use crate::types::{CollectionFailure, MetricKind, MetricRecord, ProjectScope};

/// Everything one project contributed to a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectReport {
    /// Records from every collector that finished, in collector order.
    pub records: Vec<MetricRecord>,
    /// Collectors that panicked or timed out.
    pub failures: Vec<CollectionFailure>,
}

impl ProjectReport {
    /// Records of one kind.
    pub fn records_of(&self, kind: MetricKind) -> impl Iterator<Item = &MetricRecord> {
        self.records.iter().filter(move |record| record.kind() == kind)
    }
}

/// Runs the enabled collectors for one project.
#[derive(Debug, Clone)]
pub struct ProjectAggregator {
    sources: Sources,
    limits: CollectionLimits,
}

impl ProjectAggregator {
    /// Creates an aggregator.
    #[must_use]
    pub fn new(sources: Sources, limits: CollectionLimits) -> Self {
        Self { sources, limits }
    }

    /// Resolves clusters, runs every enabled collector concurrently and merges
    /// their output.
    ///
    /// Cluster-scoped collectors are skipped, without a failure, when the
    /// project has no clusters.
    pub async fn aggregate(&self, scope: &ProjectScope) -> ProjectReport {
        let project_id = scope.project_id.as_str();
        let wants_clusters = MetricKind::ALL
            .iter()
            .any(|kind| kind.requires_clusters() && scope.toggles.is_enabled(*kind));
        let clusters = if wants_clusters {
            ClusterResolver::new(self.sources.resources.as_ref(), self.limits.discovery_timeout())
                .resolve(scope)
                .await
        } else {
            Vec::new()
        };

        let collectors = collector_set(&scope.toggles, !clusters.is_empty());
        debug!(
            project = project_id,
            clusters = clusters.len(),
            collectors = collectors.len(),
            "aggregating project"
        );

        let ctx = Arc::new(CollectContext::new(
            project_id,
            clusters,
            self.sources.clone(),
            self.limits,
        ));
        let branches = collectors
            .into_iter()
            .map(|collector| {
                let ctx = Arc::clone(&ctx);
                let kind = collector.kind();
                let branch = async move { Ok::<_, PulseError>(collector.collect(&ctx).await) };
                (kind, branch)
            })
            .collect();
        let options = JoinOptions::new(self.limits.collector_timeout(), self.limits.max_concurrency);

        let mut report = ProjectReport::default();
        for (kind, outcome) in join_isolated(branches, options).await {
            match outcome {
                Ok(records) => {
                    debug!(project = project_id, collector = %kind, records = records.len(), "collector finished");
                    report.records.extend(records);
                }
                Err(err) => {
                    warn!(project = project_id, collector = %kind, error = %err, "collector failed");
                    report
                        .failures
                        .push(CollectionFailure::collector(kind, project_id, err.to_string()));
                }
            }
        }
        report
    }
}
