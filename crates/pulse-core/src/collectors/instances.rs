//! Database instance CPU and storage utilization.

use std::time::Duration;

use tracing::{debug, warn};

use super::{CollectContext, CollectFuture, Collector, short_name, within};
use crate::classify::ThresholdPolicy;
use crate::error::{PulseError, Result};
use crate::join::join_isolated;
use crate::source::{TimeSeriesQuery, first_point};
use crate::types::{InstanceUtilizationRecord, MetricKind, MetricRecord, round2};

/// High-priority CPU utilization ratio.
pub const CPU_METRIC: &str = "spanner.googleapis.com/instance/cpu/utilization_by_priority";

/// Storage utilization ratio.
pub const STORAGE_METRIC: &str = "spanner.googleapis.com/instance/storage/utilization";

const LOOKBACK: Duration = Duration::from_secs(300);

/// One utilization check: which series to read and how to judge it.
struct Check {
    label: &'static str,
    operation: &'static str,
    policy: ThresholdPolicy,
    query: fn(&str) -> TimeSeriesQuery,
}

const CHECKS: [Check; 2] = [
    Check {
        label: "CPU Utilization (High Priority)",
        operation: "query instance cpu",
        policy: ThresholdPolicy::INSTANCE_CPU,
        query: cpu_query,
    },
    Check {
        label: "Storage Utilization",
        operation: "query instance storage",
        policy: ThresholdPolicy::INSTANCE_STORAGE,
        query: storage_query,
    },
];

fn cpu_query(instance: &str) -> TimeSeriesQuery {
    TimeSeriesQuery::new(CPU_METRIC, LOOKBACK)
        .resource_label("instance_id", instance)
        .metric_label("priority", "high")
}

fn storage_query(instance: &str) -> TimeSeriesQuery {
    TimeSeriesQuery::new(STORAGE_METRIC, LOOKBACK).resource_label("instance_id", instance)
}

/// Checks CPU, then storage, for every instance in the project.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceUtilizationCollector;

impl Collector for InstanceUtilizationCollector {
    fn kind(&self) -> MetricKind {
        MetricKind::InstanceUtilization
    }

    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a> {
        Box::pin(async move {
            let project = ctx.project_id.as_str();
            let listing = within(
                ctx.limits.call_timeout(),
                "list instances",
                ctx.sources.resources.list_instances(project),
            )
            .await;
            let instances = match listing {
                Ok(instances) => instances,
                Err(err) => {
                    debug!(project, error = %err, "no instances listed");
                    return Vec::new();
                }
            };

            let branches = instances
                .iter()
                .map(|resource| {
                    let name = short_name(resource).to_string();
                    let ctx = ctx.clone();
                    let instance = name.clone();
                    (name, async move { Ok::<_, PulseError>(utilization(&ctx, &instance).await) })
                })
                .collect();

            join_isolated(branches, ctx.limits.fan_out())
                .await
                .into_iter()
                .flat_map(|(instance, outcome)| match outcome {
                    Ok(records) => records,
                    Err(err) => {
                        warn!(project, instance = %instance, error = %err, "instance check lost");
                        Vec::new()
                    }
                })
                .map(MetricRecord::from)
                .collect()
        })
    }
}

/// Runs the checks in order. A failing query stops the instance but keeps the
/// records already produced.
async fn utilization(ctx: &CollectContext, instance: &str) -> Vec<InstanceUtilizationRecord> {
    let mut records = Vec::new();
    for check in &CHECKS {
        match run_check(ctx, instance, check).await {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) => {
                warn!(project = %ctx.project_id, instance, error = %err, "instance skipped");
                break;
            }
        }
    }
    records
}

async fn run_check(
    ctx: &CollectContext,
    instance: &str,
    check: &Check,
) -> Result<Option<InstanceUtilizationRecord>> {
    let query = (check.query)(instance);
    let series = within(
        ctx.limits.call_timeout(),
        check.operation,
        ctx.sources.metrics.query(&ctx.project_id, &query),
    )
    .await?;
    let Some(point) = first_point(&series) else {
        return Ok(None);
    };
    let percent = point.as_f64() * 100.0;
    Ok(check
        .policy
        .evaluate(percent)
        .map(|status| InstanceUtilizationRecord {
            project_id: ctx.project_id.clone(),
            instance_name: instance.to_string(),
            metric_type: check.label.to_string(),
            value_percent: round2(percent),
            status,
        }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CollectionLimits;
    use crate::fake::FakeCloud;
    use crate::source::Sources;
    use crate::types::Status;

    fn context(cloud: &Arc<FakeCloud>) -> CollectContext {
        CollectContext::new(
            "shop",
            Vec::new(),
            Sources::from_shared(Arc::clone(cloud)),
            CollectionLimits::default(),
        )
    }

    fn utilizations(records: Vec<MetricRecord>) -> Vec<InstanceUtilizationRecord> {
        records
            .into_iter()
            .filter_map(|record| match record {
                MetricRecord::InstanceUtilization(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn reports_cpu_then_storage() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_instance_utilization("shop", "orders", Some(0.7), Some(0.8));
        cloud.set_instance_utilization("shop", "quiet", Some(0.2), Some(0.3));

        let records = utilizations(InstanceUtilizationCollector.collect(&context(&cloud)).await);
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.instance_name.as_str(), r.metric_type.as_str(), r.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("orders", "CPU Utilization (High Priority)", Status::Critical),
                ("orders", "Storage Utilization", Status::Warning),
            ]
        );
        assert!((records[0].value_percent - 70.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_points_are_skipped() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_instance_utilization("shop", "orders", None, Some(0.95));

        let records = utilizations(InstanceUtilizationCollector.collect(&context(&cloud)).await);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric_type, "Storage Utilization");
        assert_eq!(records[0].status, Status::Critical);
    }

    #[tokio::test]
    async fn listing_failure_yields_nothing() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_instance_utilization("shop", "orders", Some(0.9), Some(0.9));
        cloud.fail_listing("shop", "instances");
        assert!(InstanceUtilizationCollector.collect(&context(&cloud)).await.is_empty());
    }

    #[tokio::test]
    async fn failing_storage_query_keeps_cpu_record() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_instance_utilization("shop", "orders", Some(0.5), Some(0.99));
        cloud.fail_query(STORAGE_METRIC);

        let records = utilizations(InstanceUtilizationCollector.collect(&context(&cloud)).await);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric_type, "CPU Utilization (High Priority)");
        assert_eq!(records[0].status, Status::Warning);
    }
}
