//! Container, Compute, Pub/Sub and Spanner resource listings.

use pulse_core::source::{
    Autoscaling, DiscoveredCluster, HostRule, NodePool, ResourceApi, SourceFuture, UrlMap,
};
use pulse_core::{ClusterIdentity, Result};
use serde::Deserialize;

use crate::GcpCloud;
use crate::client::Page;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterList {
    #[serde(default)]
    pub clusters: Vec<ClusterResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterResource {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub master_auth: MasterAuth,
    #[serde(default)]
    pub node_pools: Vec<NodePoolResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MasterAuth {
    #[serde(default)]
    pub cluster_ca_certificate: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodePoolResource {
    pub name: String,
    #[serde(default)]
    pub initial_node_count: u32,
    #[serde(default)]
    pub autoscaling: Option<AutoscalingResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AutoscalingResource {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_node_count: u32,
}

impl From<NodePoolResource> for NodePool {
    fn from(pool: NodePoolResource) -> Self {
        Self {
            name: pool.name,
            current_node_count: pool.initial_node_count,
            autoscaling: pool.autoscaling.map(|a| Autoscaling {
                enabled: a.enabled,
                max_node_count: a.max_node_count,
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrlMapList {
    #[serde(default)]
    items: Vec<UrlMapResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrlMapResource {
    name: String,
    #[serde(default)]
    host_rules: Vec<HostRuleResource>,
}

#[derive(Debug, Default, Deserialize)]
struct HostRuleResource {
    #[serde(default)]
    hosts: Vec<String>,
}

impl Page for UrlMapList {
    type Item = UrlMap;

    fn into_parts(self) -> (Vec<UrlMap>, Option<String>) {
        let maps = self
            .items
            .into_iter()
            .map(|map| UrlMap {
                name: map.name,
                host_rules: map
                    .host_rules
                    .into_iter()
                    .map(|rule| HostRule { hosts: rule.hosts })
                    .collect(),
            })
            .collect();
        (maps, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionList {
    #[serde(default)]
    subscriptions: Vec<NamedResource>,
    next_page_token: Option<String>,
}

impl Page for SubscriptionList {
    type Item = String;

    fn into_parts(self) -> (Vec<String>, Option<String>) {
        let names = self.subscriptions.into_iter().map(|s| s.name).collect();
        (names, self.next_page_token)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceList {
    #[serde(default)]
    instances: Vec<NamedResource>,
    next_page_token: Option<String>,
}

impl Page for InstanceList {
    type Item = String;

    fn into_parts(self) -> (Vec<String>, Option<String>) {
        let names = self.instances.into_iter().map(|i| i.name).collect();
        (names, self.next_page_token)
    }
}

impl GcpCloud {
    /// Reads one cluster, including its endpoint, CA and node pools.
    pub(crate) async fn get_cluster(
        &self,
        project_id: &str,
        cluster: &ClusterIdentity,
    ) -> Result<ClusterResource> {
        let url = format!(
            "{}/projects/{project_id}/locations/{}/clusters/{}",
            self.client.endpoints().container,
            cluster.location,
            cluster.name
        );
        self.client.get_json("get cluster", &url, &[]).await
    }
}

impl ResourceApi for GcpCloud {
    fn list_clusters<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<DiscoveredCluster>> {
        Box::pin(async move {
            let url = format!(
                "{}/projects/{project_id}/locations/-/clusters",
                self.client.endpoints().container
            );
            let list: ClusterList = self.client.get_json("list clusters", &url, &[]).await?;
            Ok(list
                .clusters
                .into_iter()
                .map(|c| DiscoveredCluster {
                    name: c.name,
                    location: c.location,
                })
                .collect())
        })
    }

    fn list_url_maps<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<UrlMap>> {
        Box::pin(async move {
            let url = format!(
                "{}/projects/{project_id}/global/urlMaps",
                self.client.endpoints().compute
            );
            self.client
                .list_all::<UrlMapList>("list url maps", &url, &[])
                .await
        })
    }

    fn list_subscriptions<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async move {
            let url = format!(
                "{}/projects/{project_id}/subscriptions",
                self.client.endpoints().pubsub
            );
            self.client
                .list_all::<SubscriptionList>("list subscriptions", &url, &[])
                .await
        })
    }

    fn list_instances<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async move {
            let url = format!(
                "{}/projects/{project_id}/instances",
                self.client.endpoints().spanner
            );
            self.client
                .list_all::<InstanceList>("list instances", &url, &[])
                .await
        })
    }

    fn node_pools<'a>(
        &'a self,
        project_id: &'a str,
        cluster: &'a ClusterIdentity,
    ) -> SourceFuture<'a, Vec<NodePool>> {
        Box::pin(async move {
            let cluster = self.get_cluster(project_id, cluster).await?;
            Ok(cluster.node_pools.into_iter().map(NodePool::from).collect())
        })
    }
}
