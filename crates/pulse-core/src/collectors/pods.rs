//! Pods that are not in the running phase.

use tracing::{debug, warn};

use super::{CollectContext, CollectFuture, Collector, list_cluster_pods, per_cluster};
use crate::classify::classify_pod_phase;
use crate::types::{MetricKind, MetricRecord, PodRecord, Status};

/// Lists pods in every cluster and reports the ones that are not running.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodCollector;

impl Collector for PodCollector {
    fn kind(&self) -> MetricKind {
        MetricKind::Pod
    }

    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a> {
        Box::pin(async move {
            let outcomes = per_cluster(ctx, |ctx, cluster| async move {
                list_cluster_pods(&ctx, &cluster).await
            })
            .await;

            let mut records: Vec<MetricRecord> = Vec::new();
            for (cluster, outcome) in outcomes {
                match outcome {
                    Ok(pods) => {
                        debug!(project = %ctx.project_id, cluster = %cluster.name, pods = pods.len(), "listed pods");
                        records.extend(
                            pods.into_iter()
                                .filter_map(|pod| {
                                    let status_icon = classify_pod_phase(&pod.phase);
                                    (status_icon != Status::Healthy).then(|| PodRecord {
                                        project_id: ctx.project_id.clone(),
                                        cluster_name: cluster.name.clone(),
                                        namespace: pod.namespace,
                                        pod_name: pod.name,
                                        status: pod.phase,
                                        status_icon,
                                    })
                                })
                                .map(MetricRecord::from),
                        );
                    }
                    Err(err) => {
                        warn!(project = %ctx.project_id, cluster = %cluster.name, error = %err, "pod listing failed");
                        records.push(
                            PodRecord::cluster_failed(&ctx.project_id, &cluster.name, err).into(),
                        );
                    }
                }
            }
            records
        })
    }
}
