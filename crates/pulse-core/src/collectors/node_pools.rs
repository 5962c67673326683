//! Autoscaling node pools close to their maximum size.

use tracing::warn;

use super::{CollectContext, CollectFuture, Collector, per_cluster, within};
use crate::classify::ThresholdPolicy;
use crate::source::NodePool;
use crate::types::{ClusterIdentity, MetricKind, MetricRecord, NodePoolRecord, round2};

/// Zones a regional cluster's per-zone counts are multiplied by.
pub const REGIONAL_ZONES: u32 = 3;

/// Reads node pools per cluster and reports autoscaling pools at or above the
/// utilization gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodePoolCollector;

impl Collector for NodePoolCollector {
    fn kind(&self) -> MetricKind {
        MetricKind::NodePool
    }

    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a> {
        Box::pin(async move {
            let outcomes = per_cluster(ctx, |ctx, cluster| async move {
                within(
                    ctx.limits.call_timeout(),
                    "get node pools",
                    ctx.sources.resources.node_pools(&ctx.project_id, &cluster),
                )
                .await
            })
            .await;

            let mut records: Vec<MetricRecord> = Vec::new();
            for (cluster, outcome) in outcomes {
                match outcome {
                    Ok(pools) => records.extend(
                        pools
                            .iter()
                            .filter_map(|pool| evaluate_pool(&ctx.project_id, &cluster, pool))
                            .map(MetricRecord::from),
                    ),
                    Err(err) => {
                        warn!(project = %ctx.project_id, cluster = %cluster.name, error = %err, "node pool read failed");
                        records.push(
                            NodePoolRecord::cluster_failed(&ctx.project_id, &cluster.name, err)
                                .into(),
                        );
                    }
                }
            }
            records
        })
    }
}

/// Builds a record for one pool if it autoscales and passes the gate.
///
/// Regional clusters report per-zone counts, so both current and maximum are
/// scaled by [`REGIONAL_ZONES`].
pub fn evaluate_pool(
    project_id: &str,
    cluster: &ClusterIdentity,
    pool: &NodePool,
) -> Option<NodePoolRecord> {
    let autoscaling = pool.autoscaling.filter(|a| a.enabled)?;
    let is_regional = cluster.kind.is_regional();
    let factor = if is_regional { REGIONAL_ZONES } else { 1 };
    let current_nodes = pool.current_node_count.saturating_mul(factor);
    let max_nodes = autoscaling.max_node_count.saturating_mul(factor);

    let utilization = if max_nodes > 0 {
        f64::from(current_nodes) / f64::from(max_nodes) * 100.0
    } else {
        0.0
    };
    let status = ThresholdPolicy::NODE_POOL.evaluate(utilization)?;

    Some(NodePoolRecord {
        project_id: project_id.to_string(),
        cluster_name: cluster.name.clone(),
        node_pool_name: pool.name.clone(),
        current_nodes,
        max_nodes,
        utilization_percent: round2(utilization),
        status,
        is_regional,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CollectionLimits;
    use crate::fake::FakeCloud;
    use crate::source::{Autoscaling, Sources};
    use crate::types::{ClusterKind, Status};
    use test_case::test_case;

    fn pool(name: &str, current: u32, max: Option<u32>) -> NodePool {
        NodePool {
            name: name.to_string(),
            current_node_count: current,
            autoscaling: max.map(|max_node_count| Autoscaling {
                enabled: true,
                max_node_count,
            }),
        }
    }

    fn zonal() -> ClusterIdentity {
        ClusterIdentity::new("batch", "us-east1-b", ClusterKind::Zonal)
    }

    #[test_case(8, 10, Some(Status::Warning) ; "exactly eighty percent")]
    #[test_case(9, 10, Some(Status::Warning) ; "ninety percent")]
    #[test_case(19, 20, Some(Status::Critical) ; "ninety five percent")]
    #[test_case(7, 10, None ; "below gate")]
    #[test_case(0, 0, None ; "zero max")]
    fn zonal_gate(current: u32, max: u32, expected: Option<Status>) {
        let record = evaluate_pool("p", &zonal(), &pool("default", current, Some(max)));
        assert_eq!(record.map(|r| r.status), expected);
    }

    #[test]
    fn just_below_eighty_is_not_reported() {
        let record = evaluate_pool("p", &zonal(), &pool("default", 7999, Some(10_000)));
        assert!(record.is_none());
        let record = evaluate_pool("p", &zonal(), &pool("default", 8000, Some(10_000))).unwrap();
        assert!((record.utilization_percent - 80.0).abs() < f64::EPSILON);
        assert_eq!(record.status, Status::Warning);
    }

    #[test]
    fn regional_counts_are_tripled() {
        let regional = ClusterIdentity::new("web", "us-central1", ClusterKind::Regional);
        // 2 of 4 per zone is 6 of 12, which stays under the gate
        assert!(evaluate_pool("p", &regional, &pool("default", 2, Some(4))).is_none());

        let record = evaluate_pool("p", &regional, &pool("default", 4, Some(4))).unwrap();
        assert_eq!(record.current_nodes, 12);
        assert_eq!(record.max_nodes, 12);
        assert!(record.is_regional);
        assert_eq!(record.status, Status::Critical);
    }

    #[test]
    fn non_autoscaling_pools_are_skipped() {
        assert!(evaluate_pool("p", &zonal(), &pool("fixed", 10, None)).is_none());

        let mut disabled = pool("disabled", 10, Some(10));
        disabled.autoscaling = Some(Autoscaling {
            enabled: false,
            max_node_count: 10,
        });
        assert!(evaluate_pool("p", &zonal(), &disabled).is_none());
    }

    #[tokio::test]
    async fn cluster_failure_is_isolated() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.add_node_pool("shop", "a", pool("default", 9, Some(10)));
        cloud.add_node_pool("shop", "b", pool("default", 9, Some(10)));
        cloud.fail_cluster("b");

        let ctx = CollectContext::new(
            "shop",
            vec![
                ClusterIdentity::new("a", "us-east1-b", ClusterKind::Zonal),
                ClusterIdentity::new("b", "us-east1-c", ClusterKind::Zonal),
            ],
            Sources::from_shared(Arc::clone(&cloud)),
            CollectionLimits::default(),
        );

        let records: Vec<_> = NodePoolCollector
            .collect(&ctx)
            .await
            .into_iter()
            .filter_map(|record| match record {
                MetricRecord::NodePool(r) => Some(r),
                _ => None,
            })
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cluster_name, "a");
        assert_eq!(records[0].node_pool_name, "default");
        assert_eq!(records[1].cluster_name, "b");
        assert_eq!(records[1].node_pool_name, "error");
        assert_eq!(records[1].status, Status::Critical);
        assert!(!records[1].is_regional);
    }
}
