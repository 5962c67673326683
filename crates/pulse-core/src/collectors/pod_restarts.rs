//! Pods whose containers restart too often.

use tracing::warn;

use super::{CollectContext, CollectFuture, Collector, list_cluster_pods, per_cluster};
use crate::classify::ThresholdPolicy;
use crate::types::{MetricKind, MetricRecord, PodRestartRecord};

/// Sums container restarts per pod and reports pods above the restart gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodRestartCollector;

impl Collector for PodRestartCollector {
    fn kind(&self) -> MetricKind {
        MetricKind::PodRestart
    }

    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a> {
        Box::pin(async move {
            let outcomes = per_cluster(ctx, |ctx, cluster| async move {
                list_cluster_pods(&ctx, &cluster).await
            })
            .await;

            let policy = ThresholdPolicy::POD_RESTARTS;
            let mut records: Vec<MetricRecord> = Vec::new();
            for (cluster, outcome) in outcomes {
                let pods = match outcome {
                    Ok(pods) => pods,
                    Err(err) => {
                        warn!(project = %ctx.project_id, cluster = %cluster.name, error = %err, "restart listing failed");
                        records.push(
                            PodRestartRecord::cluster_failed(&ctx.project_id, &cluster.name, err)
                                .into(),
                        );
                        continue;
                    }
                };
                for pod in pods {
                    let restart_count = pod.total_restarts();
                    let Some(status) = policy.evaluate(f64::from(restart_count)) else {
                        continue;
                    };
                    records.push(
                        PodRestartRecord {
                            project_id: ctx.project_id.clone(),
                            cluster_name: cluster.name.clone(),
                            namespace: pod.namespace,
                            pod_name: pod.name,
                            restart_count,
                            status,
                            error: None,
                        }
                        .into(),
                    );
                }
            }
            records
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CollectionLimits;
    use crate::fake::FakeCloud;
    use crate::source::Sources;
    use crate::types::{ClusterIdentity, ClusterKind, Status};

    fn context(cloud: &Arc<FakeCloud>, clusters: &[&str]) -> CollectContext {
        let clusters = clusters
            .iter()
            .map(|name| ClusterIdentity::new(*name, "us-east1-b", ClusterKind::Zonal))
            .collect();
        CollectContext::new(
            "shop",
            clusters,
            Sources::from_shared(Arc::clone(cloud)),
            CollectionLimits::default(),
        )
    }

    fn restarts(records: Vec<MetricRecord>) -> Vec<PodRestartRecord> {
        records
            .into_iter()
            .filter_map(|record| match record {
                MetricRecord::PodRestart(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn sums_containers_and_applies_gate() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.add_pod("shop", "web", "default", "api-0", "Running", &[2, 3, 1]);
        cloud.add_pod("shop", "web", "default", "api-1", "Running", &[5]);
        cloud.add_pod("shop", "web", "default", "api-2", "Running", &[11]);
        cloud.add_pod("shop", "web", "default", "api-3", "Running", &[20, 1]);

        let records = restarts(PodRestartCollector.collect(&context(&cloud, &["web"])).await);
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.pod_name.as_str(), r.restart_count, r.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("api-0", 6, Status::Warning),
                ("api-2", 11, Status::Warning),
                ("api-3", 21, Status::Critical),
            ]
        );
    }

    #[tokio::test]
    async fn failed_cluster_yields_sentinel() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.add_pod("shop", "a", "default", "api-0", "Running", &[9]);
        cloud.fail_cluster("b");

        let records = restarts(PodRestartCollector.collect(&context(&cloud, &["a", "b"])).await);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].restart_count, 9);
        assert_eq!(records[1].cluster_name, "b");
        assert_eq!(records[1].pod_name, "error");
        assert_eq!(records[1].restart_count, 0);
        assert_eq!(records[1].status, Status::Critical);
        assert!(records[1].error.is_some());
    }
}
