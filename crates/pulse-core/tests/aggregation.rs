//! End-to-end snapshot cycles over the in-memory cloud.

use std::sync::Arc;

use proptest::prelude::*;
use pulse_core::source::{Autoscaling, NodePool};
use pulse_core::types::NO_HOSTNAME;
use pulse_core::{
    ClusterIdentity, ClusterKind, CollectionLimits, CollectorToggles, FakeCloud, MetricKind,
    MonitorConfig, NO_PROJECTS, ProjectScope, SnapshotBuilder, Sources, Status,
};

fn builder(cloud: &Arc<FakeCloud>) -> SnapshotBuilder {
    SnapshotBuilder::new(Sources::from_shared(Arc::clone(cloud)), CollectionLimits::default())
}

fn autoscaling_pool(name: &str, current: u32, max: u32) -> NodePool {
    NodePool {
        name: name.to_string(),
        current_node_count: current,
        autoscaling: Some(Autoscaling {
            enabled: true,
            max_node_count: max,
        }),
    }
}

fn only(kind: MetricKind) -> CollectorToggles {
    CollectorToggles::none().with(kind, true)
}

#[tokio::test]
async fn failing_cluster_keeps_sibling_node_pools() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.add_node_pool("shop", "cluster-a", autoscaling_pool("default", 9, 10));
    cloud.add_node_pool("shop", "cluster-a", autoscaling_pool("gpu", 4, 4));
    cloud.add_node_pool("shop", "cluster-b", autoscaling_pool("default", 9, 10));
    cloud.fail_cluster("cluster-b");

    let scope = ProjectScope::new("shop")
        .with_cluster(ClusterIdentity::new("cluster-a", "us-east1-b", ClusterKind::Zonal))
        .with_cluster(ClusterIdentity::new("cluster-b", "us-east1-c", ClusterKind::Zonal))
        .with_toggles(only(MetricKind::NodePool));

    let snapshot = builder(&cloud).build(&[scope]).await;

    let from_a: Vec<_> = snapshot
        .node_pools
        .iter()
        .filter(|r| r.cluster_name == "cluster-a")
        .map(|r| (r.node_pool_name.as_str(), r.status))
        .collect();
    assert_eq!(from_a, vec![("default", Status::Warning), ("gpu", Status::Critical)]);

    let from_b: Vec<_> = snapshot
        .node_pools
        .iter()
        .filter(|r| r.cluster_name == "cluster-b")
        .collect();
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].node_pool_name, "error");
    assert_eq!(from_b[0].status, Status::Critical);
    assert!(snapshot.errors.is_empty());
}

#[tokio::test]
async fn regional_pool_below_gate_is_not_reported() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.add_node_pool("shop", "web", autoscaling_pool("default", 2, 4));

    let scope = ProjectScope::new("shop")
        .with_cluster(ClusterIdentity::new("web", "us-central1", ClusterKind::Regional))
        .with_toggles(only(MetricKind::NodePool));

    let snapshot = builder(&cloud).build(&[scope]).await;
    assert!(snapshot.node_pools.is_empty());
    assert!(snapshot.errors.is_empty());
}

#[tokio::test]
async fn restarts_are_summed_across_containers() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.add_pod("shop", "web", "checkout", "cart-0", "Running", &[2, 3, 1]);

    let scope = ProjectScope::new("shop")
        .with_cluster(ClusterIdentity::new("web", "us-central1", ClusterKind::Regional))
        .with_toggles(only(MetricKind::PodRestart));

    let snapshot = builder(&cloud).build(&[scope]).await;
    assert_eq!(snapshot.pod_restarts.len(), 1);
    assert_eq!(snapshot.pod_restarts[0].restart_count, 6);
    assert_eq!(snapshot.pod_restarts[0].status, Status::Warning);
    assert_eq!(cloud.open_sessions(), 0);
}

#[tokio::test]
async fn url_map_without_host_rules_is_unknown_and_unprobed() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.add_url_map("shop", "lb-internal", &[]);

    let scope = ProjectScope::new("shop").with_toggles(only(MetricKind::UrlMap));
    let snapshot = builder(&cloud).build(&[scope]).await;

    assert_eq!(snapshot.url_maps.len(), 1);
    let record = &snapshot.url_maps[0];
    assert_eq!(record.hostname, NO_HOSTNAME);
    assert_eq!(record.http_status, None);
    assert_eq!(record.status, Status::Unknown);
    assert_eq!(cloud.probe_calls(), 0);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json["url_maps"][0]["http_status"].is_null());
}

#[tokio::test]
async fn empty_configuration_reports_no_projects() {
    let cloud = Arc::new(FakeCloud::new());
    let config = MonitorConfig::from_json("{}").unwrap();

    let snapshot =
        SnapshotBuilder::from_config(Sources::from_shared(Arc::clone(&cloud)), &config).await;
    assert_eq!(snapshot.record_count(), 0);
    let errors: Vec<_> = snapshot.errors.iter().map(ToString::to_string).collect();
    assert_eq!(errors, vec![NO_PROJECTS.to_string()]);
}

#[tokio::test]
async fn discovered_clusters_feed_cluster_collectors() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.add_cluster("shop", "web", "us-central1");
    cloud.add_pod("shop", "web", "default", "api-0", "CrashLoopBackOff", &[25]);

    let snapshot = builder(&cloud).build(&[ProjectScope::new("shop")]).await;

    assert_eq!(snapshot.pods.len(), 1);
    assert_eq!(snapshot.pods[0].status_icon, Status::Critical);
    assert_eq!(snapshot.pod_restarts.len(), 1);
    assert_eq!(snapshot.pod_restarts[0].status, Status::Critical);
    assert_eq!(cloud.sessions_opened(), 2);
    assert_eq!(cloud.open_sessions(), 0);
}

#[tokio::test]
async fn discovery_failure_skips_cluster_collectors_quietly() {
    let cloud = Arc::new(FakeCloud::new());
    cloud.fail_listing("shop", "clusters");
    cloud.add_url_map("shop", "lb", &["shop.example.com"]);

    let snapshot = builder(&cloud).build(&[ProjectScope::new("shop")]).await;
    assert!(snapshot.errors.is_empty());
    assert!(snapshot.pods.is_empty());
    assert_eq!(snapshot.url_maps.len(), 1);
    assert_eq!(cloud.sessions_opened(), 0);
}

/// Seeds one project: `maps` URL maps without hosts and `subs` aged backlogs.
fn seed(cloud: &FakeCloud, project: &str, maps: usize, subs: usize) {
    for i in 0..maps {
        cloud.add_url_map(project, &format!("lb-{i}"), &[]);
    }
    for i in 0..subs {
        cloud.set_backlog(project, &format!("sub-{i}"), 10, 1200.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn snapshot_merges_every_project(counts in prop::collection::vec((0usize..4, 0usize..4), 1..5)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let cloud = Arc::new(FakeCloud::new());
        let mut projects = Vec::new();
        for (i, (maps, subs)) in counts.iter().enumerate() {
            let project = format!("project-{i}");
            seed(&cloud, &project, *maps, *subs);
            projects.push(ProjectScope::new(project).with_toggles(
                CollectorToggles::none()
                    .with(MetricKind::UrlMap, true)
                    .with(MetricKind::PubSub, true),
            ));
        }

        let snapshot = runtime.block_on(builder(&cloud).build(&projects));

        let expected_maps: usize = counts.iter().map(|(m, _)| m).sum();
        let expected_subs: usize = counts.iter().map(|(_, s)| s).sum();
        prop_assert_eq!(snapshot.url_maps.len(), expected_maps);
        prop_assert_eq!(snapshot.pubsub.len(), expected_subs);
        prop_assert!(snapshot.errors.is_empty());

        // records arrive grouped in project order
        let order: Vec<_> = snapshot.url_maps.iter().map(|r| r.project_id.clone()).collect();
        let mut sorted = order.clone();
        sorted.sort_by_key(|p| p.trim_start_matches("project-").parse::<usize>().unwrap());
        prop_assert_eq!(order, sorted);
    }
}
