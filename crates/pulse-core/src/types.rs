//! Core types for the aggregation engine.
//!
//! This module defines the data model shared by every stage of a snapshot cycle:
//! - [`Status`]: the closed four-token status vocabulary
//! - [`ProjectScope`] and [`ClusterIdentity`]: the per-cycle, read-only scope
//! - [`MetricRecord`]: the tagged union over the seven record kinds
//! - [`CollectionFailure`]: a failure converted to data

use serde::{Deserialize, Serialize, Serializer};

/// Hostname placeholder for URL maps that define no host rules.
pub const NO_HOSTNAME: &str = "no-hostname-configured";

/// Name used by sentinel records in place of the sub-resource name.
pub const SENTINEL_NAME: &str = "error";

/// Health status of a single observation.
///
/// Serialized as one of four fixed glyphs; consumers treat this as a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    /// Observation is within normal bounds.
    #[serde(rename = "🟢")]
    Healthy,
    /// Observation crossed a warning band.
    #[serde(rename = "🟡")]
    Warning,
    /// Observation crossed a critical band or could not be measured.
    #[serde(rename = "🔴")]
    Critical,
    /// Observation could not be obtained.
    #[default]
    #[serde(rename = "⚪")]
    Unknown,
}

impl Status {
    /// Returns the wire glyph for this status.
    #[must_use]
    pub const fn glyph(&self) -> &'static str {
        match self {
            Self::Healthy => "🟢",
            Self::Warning => "🟡",
            Self::Critical => "🔴",
            Self::Unknown => "⚪",
        }
    }

    /// Severity rank used to pick between bands. Unknown ranks lowest since it
    /// is never produced by a band.
    #[must_use]
    pub const fn severity(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Healthy => 1,
            Self::Warning => 2,
            Self::Critical => 3,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Whether a GKE cluster spans a region or a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterKind {
    /// Control plane and nodes replicated across the zones of a region.
    #[serde(alias = "Regional", alias = "REGIONAL")]
    Regional,
    /// Single-zone cluster.
    #[serde(alias = "Zonal", alias = "ZONAL")]
    Zonal,
}

impl ClusterKind {
    /// Infers the kind from a location string.
    ///
    /// `us-central1-a` (two or more hyphens) is zonal, `us-central1` is regional.
    #[must_use]
    pub fn from_location(location: &str) -> Self {
        if location.matches('-').count() >= 2 {
            Self::Zonal
        } else {
            Self::Regional
        }
    }

    /// Returns true for regional clusters.
    #[must_use]
    pub const fn is_regional(&self) -> bool {
        matches!(self, Self::Regional)
    }
}

/// Identity of a GKE cluster within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ClusterEntry")]
pub struct ClusterIdentity {
    /// Cluster name.
    pub name: String,
    /// Region or zone.
    pub location: String,
    /// Regional or zonal.
    #[serde(rename = "type")]
    pub kind: ClusterKind,
}

/// Config form of a cluster, where `type` may be omitted.
#[derive(Deserialize)]
struct ClusterEntry {
    name: String,
    location: String,
    #[serde(rename = "type", default)]
    kind: Option<ClusterKind>,
}

impl From<ClusterEntry> for ClusterIdentity {
    fn from(entry: ClusterEntry) -> Self {
        let kind = entry
            .kind
            .unwrap_or_else(|| ClusterKind::from_location(&entry.location));
        Self {
            name: entry.name,
            location: entry.location,
            kind,
        }
    }
}

impl ClusterIdentity {
    /// Creates an identity with an explicit kind.
    pub fn new(name: impl Into<String>, location: impl Into<String>, kind: ClusterKind) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            kind,
        }
    }

    /// Creates an identity whose kind is inferred from the location.
    pub fn discovered(name: impl Into<String>, location: impl Into<String>) -> Self {
        let location = location.into();
        let kind = ClusterKind::from_location(&location);
        Self {
            name: name.into(),
            location,
            kind,
        }
    }
}

/// Which collectors run for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorToggles {
    /// Probe hostnames behind load-balancer URL maps.
    #[serde(rename = "monitor_url_maps", default = "enabled")]
    pub url_maps: bool,
    /// Report pods that are not running.
    #[serde(rename = "monitor_gke_pods", default = "enabled")]
    pub gke_pods: bool,
    /// Report Pub/Sub subscriptions with an aged backlog.
    #[serde(rename = "monitor_pubsub", default = "enabled")]
    pub pubsub: bool,
    /// Report autoscaling node pools near their maximum.
    #[serde(rename = "monitor_gke_nodes", default = "enabled")]
    pub gke_nodes: bool,
    /// Report pods that restart too often.
    #[serde(rename = "monitor_pod_restarts", default = "enabled")]
    pub pod_restarts: bool,
    /// Report slow load-balancer backends.
    #[serde(rename = "monitor_latency", default = "enabled")]
    pub latency: bool,
    /// Report Spanner CPU and storage utilization.
    #[serde(rename = "monitor_spanner", default = "enabled")]
    pub spanner: bool,
}

const fn enabled() -> bool {
    true
}

impl Default for CollectorToggles {
    fn default() -> Self {
        Self::all()
    }
}

impl CollectorToggles {
    /// Every collector enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            url_maps: true,
            gke_pods: true,
            pubsub: true,
            gke_nodes: true,
            pod_restarts: true,
            latency: true,
            spanner: true,
        }
    }

    /// Every collector disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            url_maps: false,
            gke_pods: false,
            pubsub: false,
            gke_nodes: false,
            pod_restarts: false,
            latency: false,
            spanner: false,
        }
    }

    /// Returns a copy with one kind switched on or off.
    #[must_use]
    pub const fn with(mut self, kind: MetricKind, on: bool) -> Self {
        match kind {
            MetricKind::UrlMap => self.url_maps = on,
            MetricKind::Pod => self.gke_pods = on,
            MetricKind::PubSub => self.pubsub = on,
            MetricKind::NodePool => self.gke_nodes = on,
            MetricKind::PodRestart => self.pod_restarts = on,
            MetricKind::Latency => self.latency = on,
            MetricKind::InstanceUtilization => self.spanner = on,
        }
        self
    }

    /// Returns true if the collector for `kind` is enabled.
    #[must_use]
    pub const fn is_enabled(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::UrlMap => self.url_maps,
            MetricKind::Pod => self.gke_pods,
            MetricKind::PubSub => self.pubsub,
            MetricKind::NodePool => self.gke_nodes,
            MetricKind::PodRestart => self.pod_restarts,
            MetricKind::Latency => self.latency,
            MetricKind::InstanceUtilization => self.spanner,
        }
    }
}

/// One configured project and the collectors that run against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectScope {
    /// Cloud project identifier.
    pub project_id: String,
    /// Explicit cluster list; empty means "discover".
    #[serde(rename = "gke_clusters", default)]
    pub clusters: Vec<ClusterIdentity>,
    /// Collector switches.
    #[serde(flatten)]
    pub toggles: CollectorToggles,
}

impl ProjectScope {
    /// Creates a scope with every collector enabled and no explicit clusters.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            clusters: Vec::new(),
            toggles: CollectorToggles::all(),
        }
    }

    /// Adds an explicit cluster.
    #[must_use]
    pub fn with_cluster(mut self, cluster: ClusterIdentity) -> Self {
        self.clusters.push(cluster);
        self
    }

    /// Replaces the collector switches.
    #[must_use]
    pub const fn with_toggles(mut self, toggles: CollectorToggles) -> Self {
        self.toggles = toggles;
        self
    }
}

/// The seven metric kinds, one per collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    /// Synthetic HTTP probes of URL map hostnames.
    UrlMap,
    /// Pods not in the running phase.
    Pod,
    /// Pub/Sub subscription backlog.
    PubSub,
    /// Autoscaling node pool headroom.
    NodePool,
    /// Pod restart counts.
    PodRestart,
    /// Load-balancer backend p95 latency.
    Latency,
    /// Database instance CPU and storage utilization.
    InstanceUtilization,
}

impl MetricKind {
    /// All kinds in snapshot field order.
    pub const ALL: [Self; 7] = [
        Self::UrlMap,
        Self::Pod,
        Self::PubSub,
        Self::NodePool,
        Self::PodRestart,
        Self::Latency,
        Self::InstanceUtilization,
    ];

    /// Short label used in error messages and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UrlMap => "url_maps",
            Self::Pod => "pods",
            Self::PubSub => "pubsub",
            Self::NodePool => "nodes",
            Self::PodRestart => "restarts",
            Self::Latency => "latency",
            Self::InstanceUtilization => "spanner",
        }
    }

    /// Returns true if the collector needs at least one cluster to run.
    #[must_use]
    pub const fn requires_clusters(&self) -> bool {
        matches!(self, Self::Pod | Self::NodePool | Self::PodRestart)
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rounds a display value to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Result of probing one hostname behind a URL map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlMapRecord {
    /// Project the URL map belongs to.
    pub project_id: String,
    /// URL map name.
    pub url_map_name: String,
    /// Probed hostname.
    pub hostname: String,
    /// HTTP status returned by the probe, if any.
    pub http_status: Option<u16>,
    /// Derived status.
    pub status: Status,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UrlMapRecord {
    /// Record for a URL map that defines no host rules.
    pub fn no_hostname(project_id: impl Into<String>, url_map_name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            url_map_name: url_map_name.into(),
            hostname: NO_HOSTNAME.to_string(),
            http_status: None,
            status: Status::Unknown,
            error: Some("No hostname configured".to_string()),
        }
    }

    /// Sentinel for a project whose URL maps could not be listed.
    pub fn listing_failed(project_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            project_id: project_id.into(),
            url_map_name: SENTINEL_NAME.to_string(),
            hostname: SENTINEL_NAME.to_string(),
            http_status: None,
            status: Status::Critical,
            error: Some(format!("Failed to fetch URL maps: {message}")),
        }
    }
}

/// A pod that is not in the running phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    /// Project the cluster belongs to.
    pub project_id: String,
    /// Cluster name.
    pub cluster_name: String,
    /// Pod namespace.
    pub namespace: String,
    /// Pod name.
    pub pod_name: String,
    /// Raw pod phase, or `Error: …` for sentinels.
    pub status: String,
    /// Derived status.
    pub status_icon: Status,
}

impl PodRecord {
    /// Sentinel for a cluster whose pods could not be listed.
    pub fn cluster_failed(
        project_id: impl Into<String>,
        cluster_name: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            cluster_name: cluster_name.into(),
            namespace: SENTINEL_NAME.to_string(),
            pod_name: SENTINEL_NAME.to_string(),
            status: format!("Error: {message}"),
            status_icon: Status::Critical,
        }
    }
}

/// A subscription with an aged unacknowledged backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubRecord {
    /// Project the subscription belongs to.
    pub project_id: String,
    /// Short subscription name.
    pub subscription_name: String,
    /// Undelivered message count.
    pub unacked_messages: i64,
    /// Age of the oldest unacknowledged message, in minutes.
    pub oldest_message_age_minutes: f64,
    /// Derived status.
    pub status: Status,
    /// Failure detail for sentinels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PubSubRecord {
    /// Sentinel for a project whose subscriptions could not be listed.
    pub fn listing_failed(project_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            project_id: project_id.into(),
            subscription_name: SENTINEL_NAME.to_string(),
            unacked_messages: 0,
            oldest_message_age_minutes: 0.0,
            status: Status::Critical,
            error: Some(message.to_string()),
        }
    }
}

/// An autoscaling node pool close to its maximum size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePoolRecord {
    /// Project the cluster belongs to.
    pub project_id: String,
    /// Cluster name.
    pub cluster_name: String,
    /// Node pool name.
    pub node_pool_name: String,
    /// Effective current node count (×3 for regional clusters).
    pub current_nodes: u32,
    /// Effective maximum node count (×3 for regional clusters).
    pub max_nodes: u32,
    /// Current as a percentage of maximum.
    pub utilization_percent: f64,
    /// Derived status.
    pub status: Status,
    /// Whether the cluster is regional.
    pub is_regional: bool,
    /// Failure detail for sentinels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodePoolRecord {
    /// Sentinel for a cluster whose node pools could not be read.
    pub fn cluster_failed(
        project_id: impl Into<String>,
        cluster_name: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            cluster_name: cluster_name.into(),
            node_pool_name: SENTINEL_NAME.to_string(),
            current_nodes: 0,
            max_nodes: 0,
            utilization_percent: 0.0,
            status: Status::Critical,
            is_regional: false,
            error: Some(message.to_string()),
        }
    }
}

/// A pod whose containers restarted too often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRestartRecord {
    /// Project the cluster belongs to.
    pub project_id: String,
    /// Cluster name.
    pub cluster_name: String,
    /// Pod namespace.
    pub namespace: String,
    /// Pod name.
    pub pod_name: String,
    /// Restarts summed across all containers.
    pub restart_count: u32,
    /// Derived status.
    pub status: Status,
    /// Failure detail for sentinels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PodRestartRecord {
    /// Sentinel for a cluster whose pods could not be listed.
    pub fn cluster_failed(
        project_id: impl Into<String>,
        cluster_name: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            cluster_name: cluster_name.into(),
            namespace: SENTINEL_NAME.to_string(),
            pod_name: SENTINEL_NAME.to_string(),
            restart_count: 0,
            status: Status::Critical,
            error: Some(message.to_string()),
        }
    }
}

/// A load-balancer backend with slow p95 latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    /// Project the backend belongs to.
    pub project_id: String,
    /// Backend target name.
    pub backend_service: String,
    /// p95 latency in seconds.
    pub p95_latency_seconds: f64,
    /// Derived status.
    pub status: Status,
}

/// CPU or storage utilization of a database instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceUtilizationRecord {
    /// Project the instance belongs to.
    pub project_id: String,
    /// Short instance name.
    pub instance_name: String,
    /// Human-readable metric label.
    pub metric_type: String,
    /// Utilization percentage.
    pub value_percent: f64,
    /// Derived status.
    pub status: Status,
}

/// Tagged union over the seven record kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricRecord {
    /// URL map probe result.
    UrlMap(UrlMapRecord),
    /// Non-running pod.
    Pod(PodRecord),
    /// Pub/Sub backlog.
    PubSub(PubSubRecord),
    /// Node pool headroom.
    NodePool(NodePoolRecord),
    /// Pod restarts.
    PodRestart(PodRestartRecord),
    /// Backend latency.
    Latency(LatencyRecord),
    /// Instance utilization.
    InstanceUtilization(InstanceUtilizationRecord),
}

impl MetricRecord {
    /// The kind of collector that produced this record.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::UrlMap(_) => MetricKind::UrlMap,
            Self::Pod(_) => MetricKind::Pod,
            Self::PubSub(_) => MetricKind::PubSub,
            Self::NodePool(_) => MetricKind::NodePool,
            Self::PodRestart(_) => MetricKind::PodRestart,
            Self::Latency(_) => MetricKind::Latency,
            Self::InstanceUtilization(_) => MetricKind::InstanceUtilization,
        }
    }

    /// The derived status of this record.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::UrlMap(r) => r.status,
            Self::Pod(r) => r.status_icon,
            Self::PubSub(r) => r.status,
            Self::NodePool(r) => r.status,
            Self::PodRestart(r) => r.status,
            Self::Latency(r) => r.status,
            Self::InstanceUtilization(r) => r.status,
        }
    }

    /// The project this record belongs to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        match self {
            Self::UrlMap(r) => &r.project_id,
            Self::Pod(r) => &r.project_id,
            Self::PubSub(r) => &r.project_id,
            Self::NodePool(r) => &r.project_id,
            Self::PodRestart(r) => &r.project_id,
            Self::Latency(r) => &r.project_id,
            Self::InstanceUtilization(r) => &r.project_id,
        }
    }
}

macro_rules! impl_from_record {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MetricRecord {
                fn from(record: $ty) -> Self {
                    Self::$variant(record)
                }
            }
        )*
    };
}

impl_from_record! {
    UrlMap => UrlMapRecord,
    Pod => PodRecord,
    PubSub => PubSubRecord,
    NodePool => NodePoolRecord,
    PodRestart => PodRestartRecord,
    Latency => LatencyRecord,
    InstanceUtilization => InstanceUtilizationRecord,
}

/// Where a [`CollectionFailure`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    /// One collector failed for one project.
    Collector(MetricKind),
    /// A whole project branch failed.
    Project,
    /// The cycle could not be configured.
    Configuration,
}

/// A failure converted to data.
///
/// Serialized as its display string, which is what the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    /// Where the failure happened.
    pub source: FailureSource,
    /// Project the failure belongs to, if any.
    pub project_id: Option<String>,
    /// Sub-resource (cluster, subscription, instance) the failure belongs to.
    pub sub_resource: Option<String>,
    /// Human-readable cause.
    pub message: String,
}

impl CollectionFailure {
    /// A collector failed for a project.
    pub fn collector(
        kind: MetricKind,
        project_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: FailureSource::Collector(kind),
            project_id: Some(project_id.into()),
            sub_resource: None,
            message: message.into(),
        }
    }

    /// A project branch failed.
    pub fn project(project_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: FailureSource::Project,
            project_id: Some(project_id.into()),
            sub_resource: None,
            message: message.into(),
        }
    }

    /// The cycle itself could not be configured.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self {
            source: FailureSource::Configuration,
            project_id: None,
            sub_resource: None,
            message: message.into(),
        }
    }

    /// Attaches a sub-resource identifier.
    #[must_use]
    pub fn with_sub_resource(mut self, sub_resource: impl Into<String>) -> Self {
        self.sub_resource = Some(sub_resource.into());
        self
    }
}

impl std::fmt::Display for CollectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let project = self.project_id.as_deref().unwrap_or("-");
        match self.source {
            FailureSource::Collector(kind) => {
                write!(f, "Error in {kind} for {project}")?;
                if let Some(sub) = &self.sub_resource {
                    write!(f, " ({sub})")?;
                }
                write!(f, ": {}", self.message)
            }
            FailureSource::Project => {
                write!(f, "Error processing project {project}: {}", self.message)
            }
            FailureSource::Configuration => f.write_str(&self.message),
        }
    }
}

impl Serialize for CollectionFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
