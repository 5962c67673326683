//! Collaborator contracts.
//!
//! The engine never talks to a cloud API directly. It consumes these traits,
//! which are implemented by the REST adapters in `pulse-gcp` and by
//! [`FakeCloud`](crate::fake::FakeCloud) in tests.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::ClusterIdentity;

/// Boxed future returned by every collaborator call.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A cluster as reported by discovery, before its kind is inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCluster {
    /// Cluster name.
    pub name: String,
    /// Region or zone.
    pub location: String,
}

/// A load-balancer URL map and its host rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlMap {
    /// URL map name.
    pub name: String,
    /// Host rules; each lists one or more hostnames.
    pub host_rules: Vec<HostRule>,
}

/// One host rule of a URL map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRule {
    /// Hostnames matched by the rule.
    pub hosts: Vec<String>,
}

/// Autoscaling settings of a node pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Autoscaling {
    /// Whether the autoscaler manages this pool.
    pub enabled: bool,
    /// Upper bound per zone.
    pub max_node_count: u32,
}

/// A GKE node pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePool {
    /// Pool name.
    pub name: String,
    /// Node count per zone.
    pub current_node_count: u32,
    /// Autoscaling settings, absent when never configured.
    pub autoscaling: Option<Autoscaling>,
}

/// A pod as listed from a cluster's API server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodInfo {
    /// Namespace.
    pub namespace: String,
    /// Pod name.
    pub name: String,
    /// Phase (`Running`, `Pending`, ...).
    pub phase: String,
    /// Restart count of every container status.
    pub container_restarts: Vec<u32>,
}

impl PodInfo {
    /// Restarts summed across all containers, saturating at `u32::MAX`.
    #[must_use]
    pub fn total_restarts(&self) -> u32 {
        self.container_restarts
            .iter()
            .copied()
            .fold(0u32, u32::saturating_add)
    }
}

/// Per-series alignment applied by the metrics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aligner {
    /// Mean over each alignment period.
    Mean,
    /// Change over each alignment period.
    Delta,
}

/// Cross-series reduction applied by the metrics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// 95th percentile across series in a group.
    Percentile95,
}

/// A time-series query over a fixed lookback window ending now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesQuery {
    /// Fully-qualified metric type.
    pub metric_type: String,
    /// Required resource label values.
    pub resource_labels: BTreeMap<String, String>,
    /// Required metric label values.
    pub metric_labels: BTreeMap<String, String>,
    /// How far back the window starts.
    pub lookback: Duration,
    /// Alignment period.
    pub alignment_period: Duration,
    /// Per-series aligner.
    pub aligner: Aligner,
    /// Optional cross-series reducer.
    pub reducer: Option<Reducer>,
    /// Fields to group by when reducing.
    pub group_by: Vec<String>,
}

impl TimeSeriesQuery {
    /// Creates a mean-aligned query with a one-minute alignment period.
    pub fn new(metric_type: impl Into<String>, lookback: Duration) -> Self {
        Self {
            metric_type: metric_type.into(),
            resource_labels: BTreeMap::new(),
            metric_labels: BTreeMap::new(),
            lookback,
            alignment_period: Duration::from_secs(60),
            aligner: Aligner::Mean,
            reducer: None,
            group_by: Vec::new(),
        }
    }

    /// Requires a resource label value.
    #[must_use]
    pub fn resource_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_labels.insert(key.into(), value.into());
        self
    }

    /// Requires a metric label value.
    #[must_use]
    pub fn metric_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metric_labels.insert(key.into(), value.into());
        self
    }

    /// Sets the per-series aligner.
    #[must_use]
    pub const fn aligner(mut self, aligner: Aligner) -> Self {
        self.aligner = aligner;
        self
    }

    /// Reduces across series, grouped by the given fields.
    #[must_use]
    pub fn reduce(mut self, reducer: Reducer, group_by: &[&str]) -> Self {
        self.reducer = Some(reducer);
        self.group_by = group_by.iter().map(|field| (*field).to_string()).collect();
        self
    }

    /// Renders the monitoring filter expression.
    #[must_use]
    pub fn filter(&self) -> String {
        let mut filter = format!("metric.type=\"{}\"", self.metric_type);
        for (key, value) in &self.resource_labels {
            filter.push_str(&format!(" AND resource.labels.{key}=\"{value}\""));
        }
        for (key, value) in &self.metric_labels {
            filter.push_str(&format!(" AND metric.labels.{key}=\"{value}\""));
        }
        filter
    }
}

/// The value of one point. Exactly one encoding is present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedValue {
    /// 64-bit integer counter or gauge.
    Int64(i64),
    /// Floating-point gauge.
    Double(f64),
    /// Distribution, reduced to its mean.
    Distribution {
        /// Mean of the distribution.
        mean: f64,
    },
}

impl TypedValue {
    /// The value as a float: integers convert, distributions yield their mean.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int64(value) => value as f64,
            Self::Double(value) => value,
            Self::Distribution { mean } => mean,
        }
    }

    /// The value as a count. Floating values truncate toward zero.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        match *self {
            Self::Int64(value) => value,
            Self::Double(value) => value.trunc() as i64,
            Self::Distribution { mean } => mean.trunc() as i64,
        }
    }
}

/// One series returned by a query, newest point first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    /// Monitored-resource labels.
    pub resource_labels: BTreeMap<String, String>,
    /// Metric labels.
    pub metric_labels: BTreeMap<String, String>,
    /// Points, newest first.
    pub points: Vec<TypedValue>,
}

impl TimeSeries {
    /// The newest point, if any.
    #[must_use]
    pub fn latest(&self) -> Option<TypedValue> {
        self.points.first().copied()
    }
}

/// Newest point of the first series that has any points.
#[must_use]
pub fn first_point(series: &[TimeSeries]) -> Option<TypedValue> {
    series.iter().find_map(TimeSeries::latest)
}

/// Cloud resource listing.
pub trait ResourceApi: Send + Sync {
    /// Lists every cluster in every location of a project.
    fn list_clusters<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<DiscoveredCluster>>;

    /// Lists the global URL maps of a project.
    fn list_url_maps<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<UrlMap>>;

    /// Lists Pub/Sub subscriptions by full resource name.
    fn list_subscriptions<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<String>>;

    /// Lists database instances by full resource name.
    fn list_instances<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<String>>;

    /// Reads the node pools of one cluster.
    fn node_pools<'a>(
        &'a self,
        project_id: &'a str,
        cluster: &'a ClusterIdentity,
    ) -> SourceFuture<'a, Vec<NodePool>>;
}

/// Time-series metric queries.
pub trait MetricsApi: Send + Sync {
    /// Runs a query against a project's metrics.
    fn query<'a>(
        &'a self,
        project_id: &'a str,
        query: &'a TimeSeriesQuery,
    ) -> SourceFuture<'a, Vec<TimeSeries>>;
}

/// Access to a single cluster's API server.
///
/// A session holds short-lived credential material; dropping it releases that
/// material. Sessions are never cached across clusters or cycles.
pub trait ClusterSession: Send + Sync {
    /// Lists pods in every namespace.
    fn list_pods(&self) -> SourceFuture<'_, Vec<PodInfo>>;
}

/// Exchanges project credentials for a per-cluster session.
pub trait ClusterAccess: Send + Sync {
    /// Opens a session against one cluster.
    fn connect<'a>(
        &'a self,
        project_id: &'a str,
        cluster: &'a ClusterIdentity,
    ) -> SourceFuture<'a, Box<dyn ClusterSession>>;
}

/// Active HTTP probing.
pub trait HttpProber: Send + Sync {
    /// Issues a GET and returns the final status code after redirects.
    fn probe<'a>(&'a self, url: &'a str) -> SourceFuture<'a, u16>;
}

/// The collaborators one snapshot cycle draws on.
#[derive(Clone)]
pub struct Sources {
    /// Resource listing.
    pub resources: Arc<dyn ResourceApi>,
    /// Metric queries.
    pub metrics: Arc<dyn MetricsApi>,
    /// Cluster sessions.
    pub clusters: Arc<dyn ClusterAccess>,
    /// Hostname probes.
    pub prober: Arc<dyn HttpProber>,
}

impl Sources {
    /// Builds the bundle from one value that implements every contract.
    pub fn from_shared<T>(cloud: Arc<T>) -> Self
    where
        T: ResourceApi + MetricsApi + ClusterAccess + HttpProber + 'static,
    {
        Self {
            resources: cloud.clone(),
            metrics: cloud.clone(),
            clusters: cloud.clone(),
            prober: cloud,
        }
    }
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_renders_labels_in_order() {
        let query = TimeSeriesQuery::new(
            "spanner.googleapis.com/instance/cpu/utilization_by_priority",
            Duration::from_secs(300),
        )
        .resource_label("instance_id", "orders")
        .metric_label("priority", "high");

        assert_eq!(
            query.filter(),
            "metric.type=\"spanner.googleapis.com/instance/cpu/utilization_by_priority\" \
             AND resource.labels.instance_id=\"orders\" AND metric.labels.priority=\"high\""
        );
    }

    #[test]
    fn reduce_sets_group_by() {
        let query = TimeSeriesQuery::new("m", Duration::from_secs(600))
            .aligner(Aligner::Delta)
            .reduce(Reducer::Percentile95, &["resource.backend_target_name"]);

        assert_eq!(query.aligner, Aligner::Delta);
        assert_eq!(query.reducer, Some(Reducer::Percentile95));
        assert_eq!(query.group_by, vec!["resource.backend_target_name"]);
    }

    #[test]
    fn typed_value_conversions() {
        assert!((TypedValue::Int64(42).as_f64() - 42.0).abs() < f64::EPSILON);
        assert_eq!(TypedValue::Double(12.9).as_i64(), 12);
        assert!((TypedValue::Distribution { mean: 4200.0 }.as_f64() - 4200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn first_point_skips_empty_series() {
        let series = vec![
            TimeSeries::default(),
            TimeSeries {
                points: vec![TypedValue::Double(0.7), TypedValue::Double(0.2)],
                ..TimeSeries::default()
            },
        ];
        assert_eq!(first_point(&series), Some(TypedValue::Double(0.7)));
        assert_eq!(first_point(&[]), None);
    }

    #[test]
    fn total_restarts_sums_containers() {
        let pod = PodInfo {
            namespace: "shop".to_string(),
            name: "api-0".to_string(),
            phase: "Running".to_string(),
            container_restarts: vec![2, 3, 1],
        };
        assert_eq!(pod.total_restarts(), 6);
    }

    #[test]
    fn total_restarts_saturates() {
        let pod = PodInfo {
            namespace: "shop".to_string(),
            name: "crashloop-0".to_string(),
            phase: "Running".to_string(),
            container_restarts: vec![u32::MAX, 5, 1],
        };
        assert_eq!(pod.total_restarts(), u32::MAX);
    }
}
