//! Load-balancer backends with a slow p95.

use std::time::Duration;

use tracing::warn;

use super::{CollectContext, CollectFuture, Collector, within};
use crate::classify::ThresholdPolicy;
use crate::source::{Aligner, Reducer, TimeSeries, TimeSeriesQuery};
use crate::types::{LatencyRecord, MetricKind, MetricRecord, round2};

/// Backend latency distribution, in milliseconds.
pub const BACKEND_LATENCY_METRIC: &str = "loadbalancing.googleapis.com/https/backend_latencies";

const BACKEND_LABEL: &str = "backend_target_name";
const LOOKBACK: Duration = Duration::from_secs(600);

/// Runs one project-wide p95 query grouped by backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyCollector;

impl LatencyCollector {
    /// The query this collector issues.
    #[must_use]
    pub fn query() -> TimeSeriesQuery {
        TimeSeriesQuery::new(BACKEND_LATENCY_METRIC, LOOKBACK)
            .aligner(Aligner::Delta)
            .reduce(Reducer::Percentile95, &["resource.backend_target_name"])
    }
}

impl Collector for LatencyCollector {
    fn kind(&self) -> MetricKind {
        MetricKind::Latency
    }

    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a> {
        Box::pin(async move {
            let query = Self::query();
            let series = match within(
                ctx.limits.call_timeout(),
                "query backend latency",
                ctx.sources.metrics.query(&ctx.project_id, &query),
            )
            .await
            {
                Ok(series) => series,
                Err(err) => {
                    warn!(project = %ctx.project_id, error = %err, "latency query failed");
                    return Vec::new();
                }
            };

            series
                .iter()
                .filter_map(|series| slow_backend(&ctx.project_id, series))
                .map(MetricRecord::from)
                .collect()
        })
    }
}

fn slow_backend(project_id: &str, series: &TimeSeries) -> Option<LatencyRecord> {
    let seconds = series.latest()?.as_f64() / 1000.0;
    let status = ThresholdPolicy::LATENCY.evaluate(seconds)?;
    let backend_service = series
        .resource_labels
        .get(BACKEND_LABEL)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    Some(LatencyRecord {
        project_id: project_id.to_string(),
        backend_service,
        p95_latency_seconds: round2(seconds),
        status,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CollectionLimits;
    use crate::fake::FakeCloud;
    use crate::source::{Sources, TypedValue};
    use crate::types::Status;

    fn context(cloud: &Arc<FakeCloud>) -> CollectContext {
        CollectContext::new(
            "shop",
            Vec::new(),
            Sources::from_shared(Arc::clone(cloud)),
            CollectionLimits::default(),
        )
    }

    fn latencies(records: Vec<MetricRecord>) -> Vec<LatencyRecord> {
        records
            .into_iter()
            .filter_map(|record| match record {
                MetricRecord::Latency(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn converts_and_classifies_backends() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_latency(
            "shop",
            vec![
                (Some("web-backend"), TypedValue::Distribution { mean: 4200.0 }),
                (Some("api-backend"), TypedValue::Double(12_500.0)),
                (Some("fast-backend"), TypedValue::Int64(800)),
                (None, TypedValue::Double(6000.0)),
            ],
        );

        let records = latencies(LatencyCollector.collect(&context(&cloud)).await);
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.backend_service.as_str(), r.p95_latency_seconds, r.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("web-backend", 4.2, Status::Warning),
                ("api-backend", 12.5, Status::Critical),
                ("unknown", 6.0, Status::Warning),
            ]
        );
    }

    #[tokio::test]
    async fn exactly_three_seconds_is_not_reported() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_latency("shop", vec![(Some("edge"), TypedValue::Int64(3000))]);
        assert!(LatencyCollector.collect(&context(&cloud)).await.is_empty());
    }

    #[tokio::test]
    async fn query_failure_yields_nothing() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_latency("shop", vec![(Some("web"), TypedValue::Double(9000.0))]);
        cloud.fail_query(BACKEND_LATENCY_METRIC);
        assert!(LatencyCollector.collect(&context(&cloud)).await.is_empty());
    }

    #[test]
    fn query_shape() {
        let query = LatencyCollector::query();
        assert_eq!(query.aligner, Aligner::Delta);
        assert_eq!(query.reducer, Some(Reducer::Percentile95));
        assert_eq!(query.lookback, Duration::from_secs(600));
    }
}
