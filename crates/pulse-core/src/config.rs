//! The monitoring configuration document.
//!
//! Read fresh at the start of every snapshot cycle. A missing file is an empty
//! configuration; anything unreadable or invalid is a [`PulseError::Config`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PulseError, Result};
use crate::join::JoinOptions;
use crate::types::ProjectScope;

/// Time and concurrency bounds for one snapshot cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionLimits {
    /// Bound on one hostname probe.
    pub probe_timeout_secs: u64,
    /// Bound on one collaborator call.
    pub call_timeout_secs: u64,
    /// Bound on one collector for one project.
    pub collector_timeout_secs: u64,
    /// Bound on one project branch.
    pub project_timeout_secs: u64,
    /// Bound on cluster discovery.
    pub discovery_timeout_secs: u64,
    /// Maximum branches in flight per join.
    pub max_concurrency: usize,
}

impl Default for CollectionLimits {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            call_timeout_secs: 30,
            collector_timeout_secs: 90,
            project_timeout_secs: 120,
            discovery_timeout_secs: 30,
            max_concurrency: 16,
        }
    }
}

impl CollectionLimits {
    /// Bound on one hostname probe.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Bound on one collaborator call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Bound on one collector.
    #[must_use]
    pub const fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector_timeout_secs)
    }

    /// Bound on one project branch.
    #[must_use]
    pub const fn project_timeout(&self) -> Duration {
        Duration::from_secs(self.project_timeout_secs)
    }

    /// Bound on cluster discovery.
    #[must_use]
    pub const fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    /// Join options for sub-resource fan-out (clusters, hosts, subscriptions).
    ///
    /// A branch makes at most two sequential calls, so it is bounded by twice
    /// the call timeout and gives up well before its collector does.
    #[must_use]
    pub const fn fan_out(&self) -> JoinOptions {
        JoinOptions::new(self.sub_resource_timeout(), self.max_concurrency)
    }

    /// Bound on one sub-resource branch: two call timeouts.
    #[must_use]
    pub const fn sub_resource_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.saturating_mul(2))
    }

    /// Checks that no bound is zero.
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("call_timeout_secs", self.call_timeout_secs),
            ("collector_timeout_secs", self.collector_timeout_secs),
            ("project_timeout_secs", self.project_timeout_secs),
            ("discovery_timeout_secs", self.discovery_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(PulseError::Config(format!("limits.{name} must be greater than zero")));
        }
        if self.max_concurrency == 0 {
            return Err(PulseError::Config(
                "limits.max_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// The configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Projects to monitor, in snapshot order.
    #[serde(default)]
    pub projects: Vec<ProjectScope>,
    /// Cycle bounds.
    #[serde(default)]
    pub limits: CollectionLimits,
}

impl MonitorConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the document at `path`. A missing file yields an empty config.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(json) => Self::from_json(&json),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using empty config");
                Ok(Self::default())
            }
            Err(err) => Err(PulseError::Config(format!(
                "cannot read {}: {err}",
                path.display()
            ))),
        }
    }

    /// Checks project ids and limits.
    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self
            .projects
            .iter()
            .position(|p| p.project_id.trim().is_empty())
        {
            return Err(PulseError::Config(format!(
                "projects[{index}].project_id cannot be empty"
            )));
        }
        self.limits.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClusterKind;

    const SAMPLE: &str = r#"{
        "projects": [
            {
                "project_id": "shop-prod",
                "gke_clusters": [
                    {"name": "web", "location": "us-central1", "type": "regional"},
                    {"name": "batch", "location": "us-east1-b"}
                ],
                "monitor_latency": false
            },
            {"project_id": "shop-staging"}
        ],
        "limits": {"call_timeout_secs": 5}
    }"#;

    #[test]
    fn parses_sample_document() {
        let config = MonitorConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.projects.len(), 2);

        let prod = &config.projects[0];
        assert_eq!(prod.clusters.len(), 2);
        assert_eq!(prod.clusters[1].kind, ClusterKind::Zonal);
        assert!(!prod.toggles.latency);
        assert!(config.projects[1].toggles.latency);

        assert_eq!(config.limits.call_timeout(), Duration::from_secs(5));
        assert_eq!(config.limits.probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.limits.max_concurrency, 16);
    }

    #[test]
    fn fan_out_is_bounded_by_call_timeout() {
        let limits = CollectionLimits::default();
        assert_eq!(limits.fan_out().timeout, Duration::from_secs(60));
        assert!(limits.fan_out().timeout < limits.collector_timeout());
        assert_eq!(limits.fan_out().concurrency, limits.max_concurrency);

        let tight = CollectionLimits {
            call_timeout_secs: 3,
            collector_timeout_secs: 600,
            ..CollectionLimits::default()
        };
        assert_eq!(tight.fan_out().timeout, Duration::from_secs(6));

        let huge = CollectionLimits {
            call_timeout_secs: u64::MAX,
            ..CollectionLimits::default()
        };
        assert_eq!(huge.sub_resource_timeout(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn empty_document_is_empty_config() {
        let config = MonitorConfig::from_json("{}").unwrap();
        assert!(config.projects.is_empty());
        assert_eq!(config.limits, CollectionLimits::default());
    }

    #[test]
    fn rejects_empty_project_id() {
        let err = MonitorConfig::from_json(r#"{"projects": [{"project_id": " "}]}"#).unwrap_err();
        assert!(err.to_string().contains("projects[0].project_id"));
    }

    #[test]
    fn rejects_zero_limits() {
        let err = MonitorConfig::from_json(r#"{"limits": {"probe_timeout_secs": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("probe_timeout_secs"));

        let err = MonitorConfig::from_json(r#"{"limits": {"max_concurrency": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = MonitorConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, PulseError::Config(_)));
    }

    #[tokio::test]
    async fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load(dir.path().join("config.json")).await.unwrap();
        assert!(config.projects.is_empty());
    }

    #[tokio::test]
    async fn loads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = MonitorConfig::load(&path).await.unwrap();
        assert_eq!(config.projects[0].project_id, "shop-prod");
    }

    #[tokio::test]
    async fn unreadable_path_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a string
        let err = MonitorConfig::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, PulseError::Config(_)));
    }
}
