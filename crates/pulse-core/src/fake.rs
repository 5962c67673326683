//! In-memory cloud for tests.
//!
//! [`FakeCloud`] implements every collaborator contract from in-memory tables.
//! Faults (errors, panics, hangs) can be injected per listing, cluster, host,
//! or query, and counters expose how often probes ran and whether cluster
//! sessions were released.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::collectors::{
    BACKEND_LATENCY_METRIC, CPU_METRIC, OLDEST_UNACKED_METRIC, STORAGE_METRIC, UNDELIVERED_METRIC,
};
use crate::error::{PulseError, Result};
use crate::source::{
    ClusterAccess, ClusterSession, DiscoveredCluster, HostRule, HttpProber, MetricsApi, NodePool,
    PodInfo, ResourceApi, SourceFuture, TimeSeries, TimeSeriesQuery, TypedValue, UrlMap,
};
use crate::types::ClusterIdentity;

/// How an injected fault behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return an error.
    Fail,
    /// Panic inside the call.
    Panic,
    /// Never complete.
    Hang,
}

#[derive(Debug, Default)]
struct FakeState {
    clusters: BTreeMap<String, Vec<DiscoveredCluster>>,
    url_maps: BTreeMap<String, Vec<UrlMap>>,
    subscriptions: BTreeMap<String, Vec<String>>,
    instances: BTreeMap<String, Vec<String>>,
    node_pools: HashMap<(String, String), Vec<NodePool>>,
    pods: HashMap<(String, String), Vec<PodInfo>>,
    probe_status: HashMap<String, u16>,
    series: Vec<SeriesEntry>,
    faults: HashMap<String, Fault>,
}

#[derive(Debug)]
struct SeriesEntry {
    project_id: String,
    metric_type: String,
    resource_label: Option<String>,
    series: Vec<TimeSeries>,
}

impl SeriesEntry {
    fn matches(&self, project_id: &str, query: &TimeSeriesQuery) -> bool {
        self.project_id == project_id
            && self.metric_type == query.metric_type
            && self
                .resource_label
                .as_ref()
                .is_none_or(|label| query.resource_labels.values().any(|v| v == label))
    }
}

/// In-memory implementation of every collaborator contract.
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: RwLock<FakeState>,
    probe_calls: AtomicUsize,
    sessions_opened: AtomicUsize,
    open_sessions: Arc<AtomicUsize>,
}

fn listing_key(project_id: &str, what: &str) -> String {
    format!("listing:{project_id}:{what}")
}

fn cluster_key(cluster: &str) -> String {
    format!("cluster:{cluster}")
}

fn pods_key(cluster: &str) -> String {
    format!("pods:{cluster}")
}

fn host_key(host: &str) -> String {
    format!("host:{host}")
}

fn query_key(key: &str) -> String {
    format!("query:{key}")
}

impl FakeCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a discoverable cluster.
    pub fn add_cluster(&self, project_id: &str, name: &str, location: &str) {
        self.state
            .write()
            .clusters
            .entry(project_id.to_string())
            .or_default()
            .push(DiscoveredCluster {
                name: name.to_string(),
                location: location.to_string(),
            });
    }

    /// Adds a URL map with one host rule covering `hosts`; no hosts means no rules.
    pub fn add_url_map(&self, project_id: &str, name: &str, hosts: &[&str]) {
        let host_rules = if hosts.is_empty() {
            Vec::new()
        } else {
            vec![HostRule {
                hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
            }]
        };
        self.state
            .write()
            .url_maps
            .entry(project_id.to_string())
            .or_default()
            .push(UrlMap {
                name: name.to_string(),
                host_rules,
            });
    }

    /// Sets the status a probe of `host` returns. Unset hosts return 200.
    pub fn set_probe_status(&self, host: &str, status: u16) {
        self.state.write().probe_status.insert(host.to_string(), status);
    }

    /// Adds a node pool to a cluster.
    pub fn add_node_pool(&self, project_id: &str, cluster: &str, pool: NodePool) {
        self.state
            .write()
            .node_pools
            .entry((project_id.to_string(), cluster.to_string()))
            .or_default()
            .push(pool);
    }

    /// Adds a pod to a cluster.
    pub fn add_pod(
        &self,
        project_id: &str,
        cluster: &str,
        namespace: &str,
        name: &str,
        phase: &str,
        restarts: &[u32],
    ) {
        self.state
            .write()
            .pods
            .entry((project_id.to_string(), cluster.to_string()))
            .or_default()
            .push(PodInfo {
                namespace: namespace.to_string(),
                name: name.to_string(),
                phase: phase.to_string(),
                container_restarts: restarts.to_vec(),
            });
    }

    /// Adds a subscription and the two backlog series for it.
    pub fn set_backlog(&self, project_id: &str, subscription: &str, unacked: i64, age_secs: f64) {
        let mut state = self.state.write();
        state
            .subscriptions
            .entry(project_id.to_string())
            .or_default()
            .push(format!("projects/{project_id}/subscriptions/{subscription}"));
        state.series.push(SeriesEntry {
            project_id: project_id.to_string(),
            metric_type: UNDELIVERED_METRIC.to_string(),
            resource_label: Some(subscription.to_string()),
            series: vec![single_point(TypedValue::Int64(unacked))],
        });
        state.series.push(SeriesEntry {
            project_id: project_id.to_string(),
            metric_type: OLDEST_UNACKED_METRIC.to_string(),
            resource_label: Some(subscription.to_string()),
            series: vec![single_point(TypedValue::Double(age_secs))],
        });
    }

    /// Adds an instance with optional CPU and storage ratios (0.0 - 1.0).
    pub fn set_instance_utilization(
        &self,
        project_id: &str,
        instance: &str,
        cpu: Option<f64>,
        storage: Option<f64>,
    ) {
        let mut state = self.state.write();
        state
            .instances
            .entry(project_id.to_string())
            .or_default()
            .push(format!("projects/{project_id}/instances/{instance}"));
        for (metric_type, ratio) in [(CPU_METRIC, cpu), (STORAGE_METRIC, storage)] {
            let series = ratio
                .map(|ratio| vec![single_point(TypedValue::Double(ratio))])
                .unwrap_or_default();
            state.series.push(SeriesEntry {
                project_id: project_id.to_string(),
                metric_type: metric_type.to_string(),
                resource_label: Some(instance.to_string()),
                series,
            });
        }
    }

    /// Sets the p95 latency series, one per backend (milliseconds).
    pub fn set_latency(&self, project_id: &str, backends: Vec<(Option<&str>, TypedValue)>) {
        let series = backends
            .into_iter()
            .map(|(backend, value)| {
                let mut series = single_point(value);
                if let Some(backend) = backend {
                    series
                        .resource_labels
                        .insert("backend_target_name".to_string(), backend.to_string());
                }
                series
            })
            .collect();
        self.state.write().series.push(SeriesEntry {
            project_id: project_id.to_string(),
            metric_type: BACKEND_LATENCY_METRIC.to_string(),
            resource_label: None,
            series,
        });
    }

    /// Injects a fault into one listing: `clusters`, `url_maps`, `subscriptions`
    /// or `instances`.
    pub fn inject_listing(&self, project_id: &str, what: &str, fault: Fault) {
        self.inject(listing_key(project_id, what), fault);
    }

    /// Makes one listing fail.
    pub fn fail_listing(&self, project_id: &str, what: &str) {
        self.inject_listing(project_id, what, Fault::Fail);
    }

    /// Injects a fault into node pool reads and sessions for a cluster.
    pub fn inject_cluster(&self, cluster: &str, fault: Fault) {
        self.inject(cluster_key(cluster), fault);
    }

    /// Makes node pool reads and sessions for a cluster fail.
    pub fn fail_cluster(&self, cluster: &str) {
        self.inject_cluster(cluster, Fault::Fail);
    }

    /// Injects a fault into pod listings on an open session to a cluster.
    pub fn inject_pods(&self, cluster: &str, fault: Fault) {
        self.inject(pods_key(cluster), fault);
    }

    /// Makes probes of a host fail before a response arrives.
    pub fn fail_host(&self, host: &str) {
        self.inject(host_key(host), Fault::Fail);
    }

    /// Injects a fault into every query whose metric type or resource label
    /// value equals `key`.
    pub fn inject_query(&self, key: &str, fault: Fault) {
        self.inject(query_key(key), fault);
    }

    /// Makes every query matching `key` fail.
    pub fn fail_query(&self, key: &str) {
        self.inject_query(key, Fault::Fail);
    }

    /// Number of probes issued so far.
    #[must_use]
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Number of cluster sessions opened so far.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of cluster sessions not yet dropped.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    fn inject(&self, key: String, fault: Fault) {
        self.state.write().faults.insert(key, fault);
    }

    fn fault(&self, key: &str) -> Option<Fault> {
        self.state.read().faults.get(key).copied()
    }

    async fn check(&self, key: &str, operation: &str) -> Result<()> {
        let fault = self.fault(key);
        apply(fault, operation).await
    }
}

#[allow(clippy::panic)]
async fn apply(fault: Option<Fault>, operation: &str) -> Result<()> {
    match fault {
        None => Ok(()),
        Some(Fault::Fail) => Err(PulseError::request(operation, "injected failure")),
        Some(Fault::Panic) => panic!("injected panic in {operation}"),
        Some(Fault::Hang) => std::future::pending().await,
    }
}

fn single_point(value: TypedValue) -> TimeSeries {
    TimeSeries {
        points: vec![value],
        ..TimeSeries::default()
    }
}

impl ResourceApi for FakeCloud {
    fn list_clusters<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<DiscoveredCluster>> {
        Box::pin(async move {
            self.check(&listing_key(project_id, "clusters"), "list clusters")
                .await?;
            Ok(self.state.read().clusters.get(project_id).cloned().unwrap_or_default())
        })
    }

    fn list_url_maps<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<UrlMap>> {
        Box::pin(async move {
            self.check(&listing_key(project_id, "url_maps"), "list url maps")
                .await?;
            Ok(self.state.read().url_maps.get(project_id).cloned().unwrap_or_default())
        })
    }

    fn list_subscriptions<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.check(&listing_key(project_id, "subscriptions"), "list subscriptions")
                .await?;
            Ok(self
                .state
                .read()
                .subscriptions
                .get(project_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn list_instances<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.check(&listing_key(project_id, "instances"), "list instances")
                .await?;
            Ok(self.state.read().instances.get(project_id).cloned().unwrap_or_default())
        })
    }

    fn node_pools<'a>(
        &'a self,
        project_id: &'a str,
        cluster: &'a ClusterIdentity,
    ) -> SourceFuture<'a, Vec<NodePool>> {
        Box::pin(async move {
            self.check(&cluster_key(&cluster.name), "get cluster").await?;
            Ok(self
                .state
                .read()
                .node_pools
                .get(&(project_id.to_string(), cluster.name.clone()))
                .cloned()
                .unwrap_or_default())
        })
    }
}

impl MetricsApi for FakeCloud {
    fn query<'a>(
        &'a self,
        project_id: &'a str,
        query: &'a TimeSeriesQuery,
    ) -> SourceFuture<'a, Vec<TimeSeries>> {
        Box::pin(async move {
            let fault = std::iter::once(query.metric_type.as_str())
                .chain(query.resource_labels.values().map(String::as_str))
                .find_map(|key| self.fault(&query_key(key)));
            apply(fault, "list time series").await?;

            Ok(self
                .state
                .read()
                .series
                .iter()
                .filter(|entry| entry.matches(project_id, query))
                .flat_map(|entry| entry.series.iter().cloned())
                .collect())
        })
    }
}

/// A session over one fake cluster's pods.
struct FakeSession {
    pods: Vec<PodInfo>,
    fault: Option<Fault>,
    open: Arc<AtomicUsize>,
}

impl ClusterSession for FakeSession {
    fn list_pods(&self) -> SourceFuture<'_, Vec<PodInfo>> {
        Box::pin(async move {
            apply(self.fault, "list pods").await?;
            Ok(self.pods.clone())
        })
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ClusterAccess for FakeCloud {
    fn connect<'a>(
        &'a self,
        project_id: &'a str,
        cluster: &'a ClusterIdentity,
    ) -> SourceFuture<'a, Box<dyn ClusterSession>> {
        Box::pin(async move {
            self.check(&cluster_key(&cluster.name), "get cluster credentials")
                .await?;
            let pods = self
                .state
                .read()
                .pods
                .get(&(project_id.to_string(), cluster.name.clone()))
                .cloned()
                .unwrap_or_default();
            self.sessions_opened.fetch_add(1, Ordering::SeqCst);
            self.open_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                pods,
                fault: self.fault(&pods_key(&cluster.name)),
                open: Arc::clone(&self.open_sessions),
            }) as Box<dyn ClusterSession>)
        })
    }
}

impl HttpProber for FakeCloud {
    fn probe<'a>(&'a self, url: &'a str) -> SourceFuture<'a, u16> {
        Box::pin(async move {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            let host = url.trim_start_matches("https://");
            self.check(&host_key(host), &format!("GET {url}")).await?;
            Ok(self.state.read().probe_status.get(host).copied().unwrap_or(200))
        })
    }
}
