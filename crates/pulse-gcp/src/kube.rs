//! Per-cluster Kubernetes API sessions.
//!
//! A session is built from the cluster's public endpoint and CA certificate as
//! reported by the Container API, and authenticates with the project's bearer
//! token. Nothing is written to disk and nothing outlives the session.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pulse_core::source::{ClusterAccess, ClusterSession, PodInfo, SourceFuture};
use pulse_core::{ClusterIdentity, PulseError, Result};
use serde::Deserialize;
use tracing::debug;

use crate::GcpCloud;
use crate::client::{DEFAULT_REQUEST_TIMEOUT, decode_response};

/// Pods requested per page.
const PAGE_LIMIT: u32 = 500;

/// A live session against one cluster's API server.
pub struct KubeSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for KubeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSession")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KubeSession {
    /// Creates a session trusting the base64-encoded PEM `ca_certificate`.
    pub fn new(endpoint: &str, ca_certificate: &str, token: String) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(PulseError::Credentials {
                target: "cluster".to_string(),
                reason: "cluster has no endpoint".to_string(),
            });
        }
        let pem = STANDARD
            .decode(ca_certificate.trim())
            .map_err(|e| credentials(format!("invalid CA encoding: {e}")))?;
        let certificate = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| credentials(format!("invalid CA certificate: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| PulseError::request("build cluster client", e))?;
        Ok(Self {
            http,
            base_url: format!("https://{endpoint}"),
            token,
        })
    }

    async fn pods_page(&self, continue_token: Option<&str>) -> Result<PodList> {
        let mut query = vec![("limit", PAGE_LIMIT.to_string())];
        if let Some(token) = continue_token {
            query.push(("continue", token.to_string()));
        }
        let response = self
            .http
            .get(format!("{}/api/v1/pods", self.base_url))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| PulseError::request("list pods", e))?;
        decode_response("list pods", response).await
    }
}

fn credentials(reason: String) -> PulseError {
    PulseError::Credentials {
        target: "cluster".to_string(),
        reason,
    }
}

impl ClusterSession for KubeSession {
    fn list_pods(&self) -> SourceFuture<'_, Vec<PodInfo>> {
        Box::pin(async move {
            let mut pods = Vec::new();
            let mut next: Option<String> = None;
            loop {
                let page = self.pods_page(next.as_deref()).await?;
                pods.extend(page.items.into_iter().map(PodInfo::from));
                match page.metadata.continue_token {
                    Some(token) if !token.is_empty() => next = Some(token),
                    _ => return Ok(pods),
                }
            }
        })
    }
}

impl ClusterAccess for GcpCloud {
    fn connect<'a>(
        &'a self,
        project_id: &'a str,
        cluster: &'a ClusterIdentity,
    ) -> SourceFuture<'a, Box<dyn ClusterSession>> {
        Box::pin(async move {
            let resource = self.get_cluster(project_id, cluster).await?;
            let token = self.client.tokens().token().await?;
            debug!(cluster = %cluster.name, endpoint = %resource.endpoint, "opening cluster session");
            let session = KubeSession::new(
                &resource.endpoint,
                &resource.master_auth.cluster_ca_certificate,
                token,
            )?;
            Ok(Box::new(session) as Box<dyn ClusterSession>)
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct PodList {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default)]
    items: Vec<PodWire>,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(rename = "continue")]
    continue_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PodWire {
    #[serde(default)]
    metadata: PodMeta,
    #[serde(default)]
    status: PodStatusWire,
}

#[derive(Debug, Default, Deserialize)]
struct PodMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatusWire {
    #[serde(default)]
    phase: String,
    #[serde(default)]
    container_statuses: Vec<ContainerStatusWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerStatusWire {
    #[serde(default)]
    restart_count: u32,
}

impl From<PodWire> for PodInfo {
    fn from(pod: PodWire) -> Self {
        Self {
            namespace: pod.metadata.namespace,
            name: pod.metadata.name,
            phase: pod.status.phase,
            container_restarts: pod
                .status
                .container_statuses
                .iter()
                .map(|c| c.restart_count)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pod_list() {
        let json = r#"{
            "kind": "PodList",
            "metadata": {"resourceVersion": "1", "continue": "next-page"},
            "items": [
                {
                    "metadata": {"name": "cart-0", "namespace": "checkout"},
                    "status": {
                        "phase": "Running",
                        "containerStatuses": [{"restartCount": 2}, {"restartCount": 3}, {"restartCount": 1}]
                    }
                },
                {
                    "metadata": {"name": "job-x", "namespace": "batch"},
                    "status": {"phase": "Pending"}
                }
            ]
        }"#;
        let list: PodList = serde_json::from_str(json).unwrap();
        assert_eq!(list.metadata.continue_token.as_deref(), Some("next-page"));

        let pods: Vec<PodInfo> = list.items.into_iter().map(PodInfo::from).collect();
        assert_eq!(pods[0].total_restarts(), 6);
        assert_eq!(pods[0].namespace, "checkout");
        assert_eq!(pods[1].phase, "Pending");
        assert!(pods[1].container_restarts.is_empty());
    }

    #[test]
    fn session_requires_endpoint() {
        let err = KubeSession::new("", "", "token".to_string()).unwrap_err();
        assert!(matches!(err, PulseError::Credentials { .. }));
    }

    #[test]
    fn session_rejects_bad_ca_encoding() {
        let err = KubeSession::new("34.1.2.3", "not base64!!", "token".to_string()).unwrap_err();
        assert!(err.to_string().contains("invalid CA encoding"));
    }
}
