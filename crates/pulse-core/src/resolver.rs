//! Cluster resolution for a project.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{PulseError, Result};
use crate::source::ResourceApi;
use crate::types::{ClusterIdentity, ProjectScope};

/// Resolves the clusters a project's cluster-scoped collectors run against.
pub struct ClusterResolver<'a> {
    resources: &'a dyn ResourceApi,
    timeout: Duration,
}

impl<'a> ClusterResolver<'a> {
    /// Creates a resolver whose discovery call is bounded by `timeout`.
    pub fn new(resources: &'a dyn ResourceApi, timeout: Duration) -> Self {
        Self { resources, timeout }
    }

    /// Returns the configured clusters, or discovers them when none are configured.
    ///
    /// Discovery failures are logged and degrade to an empty list.
    pub async fn resolve(&self, scope: &ProjectScope) -> Vec<ClusterIdentity> {
        if !scope.clusters.is_empty() {
            return scope.clusters.clone();
        }
        match self.discover(&scope.project_id).await {
            Ok(clusters) => {
                debug!(project = %scope.project_id, count = clusters.len(), "discovered clusters");
                clusters
            }
            Err(err) => {
                warn!(project = %scope.project_id, error = %err, "cluster discovery failed");
                Vec::new()
            }
        }
    }

    /// Lists every cluster in the project, inferring kinds from locations.
    pub async fn discover(&self, project_id: &str) -> Result<Vec<ClusterIdentity>> {
        let listed = tokio::time::timeout(self.timeout, self.resources.list_clusters(project_id))
            .await
            .map_err(|_| PulseError::Timeout {
                operation: "list clusters".to_string(),
                after: self.timeout,
            })??;
        Ok(listed
            .into_iter()
            .map(|cluster| ClusterIdentity::discovered(cluster.name, cluster.location))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCloud;
    use crate::types::ClusterKind;

    #[tokio::test]
    async fn configured_clusters_are_returned_unchanged() {
        let cloud = FakeCloud::new();
        cloud.add_cluster("p", "ignored", "us-central1");
        let configured = ClusterIdentity::new("web", "us-central1-a", ClusterKind::Regional);
        let scope = ProjectScope::new("p").with_cluster(configured.clone());

        let resolver = ClusterResolver::new(&cloud, Duration::from_secs(1));
        assert_eq!(resolver.resolve(&scope).await, vec![configured]);
    }

    #[tokio::test]
    async fn discovery_infers_kinds() {
        let cloud = FakeCloud::new();
        cloud.add_cluster("p", "web", "us-central1");
        cloud.add_cluster("p", "batch", "us-central1-f");

        let resolver = ClusterResolver::new(&cloud, Duration::from_secs(1));
        let clusters = resolver.resolve(&ProjectScope::new("p")).await;

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].kind, ClusterKind::Regional);
        assert_eq!(clusters[1].kind, ClusterKind::Zonal);
    }

    #[tokio::test]
    async fn discovery_failure_degrades_to_empty() {
        let cloud = FakeCloud::new();
        cloud.add_cluster("p", "web", "us-central1");
        cloud.fail_listing("p", "clusters");

        let resolver = ClusterResolver::new(&cloud, Duration::from_secs(1));
        assert!(resolver.resolve(&ProjectScope::new("p")).await.is_empty());
        assert!(resolver.discover("p").await.is_err());
    }
}
