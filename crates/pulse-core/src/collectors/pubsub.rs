//! Pub/Sub subscriptions with an aged, unacknowledged backlog.

use std::time::Duration;

use tracing::{debug, warn};

use super::{CollectContext, CollectFuture, Collector, short_name, within};
use crate::classify::ThresholdPolicy;
use crate::error::Result;
use crate::join::join_isolated;
use crate::source::{TimeSeriesQuery, first_point};
use crate::types::{MetricKind, MetricRecord, PubSubRecord, round2};

/// Undelivered message count per subscription.
pub const UNDELIVERED_METRIC: &str = "pubsub.googleapis.com/subscription/num_undelivered_messages";

/// Age of the oldest unacknowledged message, in seconds.
pub const OLDEST_UNACKED_METRIC: &str =
    "pubsub.googleapis.com/subscription/oldest_unacked_message_age";

const LOOKBACK: Duration = Duration::from_secs(600);

/// Queries backlog size and age per subscription.
#[derive(Debug, Clone, Copy, Default)]
pub struct PubSubCollector;

impl Collector for PubSubCollector {
    fn kind(&self) -> MetricKind {
        MetricKind::PubSub
    }

    fn collect<'a>(&'a self, ctx: &'a CollectContext) -> CollectFuture<'a> {
        Box::pin(async move {
            let project = ctx.project_id.as_str();
            let listing = within(
                ctx.limits.call_timeout(),
                "list subscriptions",
                ctx.sources.resources.list_subscriptions(project),
            )
            .await;
            let subscriptions = match listing {
                Ok(subscriptions) => subscriptions,
                Err(err) => {
                    warn!(project, error = %err, "subscription listing failed");
                    return vec![PubSubRecord::listing_failed(project, err).into()];
                }
            };
            debug!(project, subscriptions = subscriptions.len(), "checking subscription backlogs");

            let branches = subscriptions
                .iter()
                .map(|resource| {
                    let name = short_name(resource).to_string();
                    (name.clone(), backlog(ctx.clone(), name))
                })
                .collect();

            join_isolated(branches, ctx.limits.fan_out())
                .await
                .into_iter()
                .filter_map(|(subscription, outcome)| match outcome {
                    Ok(record) => record.map(MetricRecord::from),
                    Err(err) => {
                        warn!(project, subscription = %subscription, error = %err, "subscription skipped");
                        None
                    }
                })
                .collect()
        })
    }
}

async fn backlog(ctx: CollectContext, subscription: String) -> Result<Option<PubSubRecord>> {
    let timeout = ctx.limits.call_timeout();
    let metrics = &ctx.sources.metrics;

    let count_query = TimeSeriesQuery::new(UNDELIVERED_METRIC, LOOKBACK)
        .resource_label("subscription_id", &subscription);
    let count_series = within(
        timeout,
        "query undelivered messages",
        metrics.query(&ctx.project_id, &count_query),
    )
    .await?;
    let unacked_messages = first_point(&count_series).map_or(0, |value| value.as_i64());

    let age_query = TimeSeriesQuery::new(OLDEST_UNACKED_METRIC, LOOKBACK)
        .resource_label("subscription_id", &subscription);
    let age_series = within(
        timeout,
        "query oldest unacked age",
        metrics.query(&ctx.project_id, &age_query),
    )
    .await?;
    let age_minutes = first_point(&age_series).map_or(0.0, |value| value.as_f64()) / 60.0;

    if unacked_messages <= 0 {
        return Ok(None);
    }
    Ok(ThresholdPolicy::PUBSUB_BACKLOG
        .evaluate(age_minutes)
        .map(|status| PubSubRecord {
            project_id: ctx.project_id.clone(),
            subscription_name: subscription,
            unacked_messages,
            oldest_message_age_minutes: round2(age_minutes),
            status,
            error: None,
        }))
}
