//! Synthetic probes of the hostnames behind load-balancer URL maps.

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::{CollectContext, CollectFuture, Collector, within};
use crate::classify::classify_http_status;
use crate::error::{PulseError, Result};
use crate::join::join_isolated;
use crate::types::{MetricKind, MetricRecord, UrlMapRecord};

/// Probes `https://{host}` for every host rule of every URL map.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlMapCollector;

impl Collector for UrlMapCollector {
    fn kind(&self) -> MetricKind {
        MetricKind::UrlMap
    }

    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a> {
        Box::pin(async move {
            let project = ctx.project_id.as_str();
            let listing = within(
                ctx.limits.call_timeout(),
                "list url maps",
                ctx.sources.resources.list_url_maps(project),
            )
            .await;
            let maps = match listing {
                Ok(maps) => maps,
                Err(err) => {
                    warn!(project, error = %err, "url map listing failed");
                    return vec![UrlMapRecord::listing_failed(project, err).into()];
                }
            };

            let mut branches: Vec<(String, BoxFuture<'static, Result<UrlMapRecord>>)> = Vec::new();
            for map in maps {
                if map.host_rules.is_empty() {
                    let record = UrlMapRecord::no_hostname(project, &map.name);
                    branches.push((map.name, async move { Ok::<_, PulseError>(record) }.boxed()));
                    continue;
                }
                for host in map.host_rules.iter().flat_map(|rule| rule.hosts.iter()) {
                    branches.push((host.clone(), probe(ctx, &map.name, host).boxed()));
                }
            }
            debug!(project, probes = branches.len(), "probing url map hosts");

            join_isolated(branches, ctx.limits.fan_out())
                .await
                .into_iter()
                .filter_map(|(host, outcome)| match outcome {
                    Ok(record) => Some(record.into()),
                    Err(err) => {
                        // probe branches never fail; only a panic or abort lands here
                        warn!(project, host = %host, error = %err, "url map probe branch lost");
                        None
                    }
                })
                .collect::<Vec<MetricRecord>>()
        })
    }
}

fn probe(
    ctx: &CollectContext,
    url_map_name: &str,
    hostname: &str,
) -> impl std::future::Future<Output = Result<UrlMapRecord>> + Send + 'static {
    let prober = ctx.sources.prober.clone();
    let timeout = ctx.limits.probe_timeout();
    let project_id = ctx.project_id.clone();
    let url_map_name = url_map_name.to_string();
    let hostname = hostname.to_string();

    async move {
        let url = format!("https://{hostname}");
        let (http_status, error) = match within(timeout, "probe", prober.probe(&url)).await {
            Ok(code) => (Some(code), None),
            Err(err) => {
                warn!(project = %project_id, host = %hostname, error = %err, "probe failed");
                (None, Some(err.to_string()))
            }
        };
        Ok(UrlMapRecord {
            project_id,
            url_map_name,
            hostname,
            http_status,
            status: classify_http_status(http_status),
            error,
        })
    }
}
