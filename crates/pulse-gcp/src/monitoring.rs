//! Cloud Monitoring time-series queries.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use pulse_core::source::{
    Aligner, MetricsApi, Reducer, SourceFuture, TimeSeries, TimeSeriesQuery, TypedValue,
};
use pulse_core::{PulseError, Result};
use serde::Deserialize;

use crate::GcpCloud;
use crate::client::Page;

const OPERATION: &str = "list time series";

/// Builds the query parameters for a `timeSeries.list` call whose window
/// ends at `now`.
pub fn query_params(query: &TimeSeriesQuery, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let lookback =
        chrono::Duration::from_std(query.lookback).unwrap_or_else(|_| chrono::Duration::zero());
    let start = now - lookback;

    let mut params = vec![
        ("filter", query.filter()),
        ("interval.startTime", rfc3339(start)),
        ("interval.endTime", rfc3339(now)),
        ("aggregation.alignmentPeriod", seconds(query.alignment_period)),
        ("aggregation.perSeriesAligner", aligner_name(query.aligner).to_string()),
        ("view", "FULL".to_string()),
    ];
    if let Some(reducer) = query.reducer {
        params.push(("aggregation.crossSeriesReducer", reducer_name(reducer).to_string()));
        for field in &query.group_by {
            params.push(("aggregation.groupByFields", field.clone()));
        }
    }
    params
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

const fn aligner_name(aligner: Aligner) -> &'static str {
    match aligner {
        Aligner::Mean => "ALIGN_MEAN",
        Aligner::Delta => "ALIGN_DELTA",
    }
}

const fn reducer_name(reducer: Reducer) -> &'static str {
    match reducer {
        Reducer::Percentile95 => "REDUCE_PERCENTILE_95",
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeriesPage {
    #[serde(default)]
    time_series: Vec<SeriesWire>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SeriesWire {
    #[serde(default)]
    resource: LabelsWire,
    #[serde(default)]
    metric: LabelsWire,
    #[serde(default)]
    points: Vec<PointWire>,
}

#[derive(Debug, Default, Deserialize)]
struct LabelsWire {
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PointWire {
    value: ValueWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueWire {
    int64_value: Option<Int64Wire>,
    double_value: Option<f64>,
    distribution_value: Option<DistributionWire>,
}

/// `int64Value` is a JSON string on the wire, but tolerate plain numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Int64Wire {
    Text(String),
    Number(i64),
}

#[derive(Debug, Default, Deserialize)]
struct DistributionWire {
    #[serde(default)]
    mean: f64,
}

impl ValueWire {
    fn into_typed(self) -> Option<TypedValue> {
        if let Some(value) = self.int64_value {
            return match value {
                Int64Wire::Number(n) => Some(TypedValue::Int64(n)),
                Int64Wire::Text(text) => text.parse().ok().map(TypedValue::Int64),
            };
        }
        if let Some(value) = self.double_value {
            return Some(TypedValue::Double(value));
        }
        self.distribution_value
            .map(|d| TypedValue::Distribution { mean: d.mean })
    }
}

impl From<SeriesWire> for TimeSeries {
    fn from(series: SeriesWire) -> Self {
        Self {
            resource_labels: series.resource.labels,
            metric_labels: series.metric.labels,
            points: series
                .points
                .into_iter()
                .filter_map(|p| p.value.into_typed())
                .collect(),
        }
    }
}

impl Page for TimeSeriesPage {
    type Item = TimeSeries;

    fn into_parts(self) -> (Vec<TimeSeries>, Option<String>) {
        let series = self.time_series.into_iter().map(TimeSeries::from).collect();
        (series, self.next_page_token)
    }
}

impl MetricsApi for GcpCloud {
    fn query<'a>(
        &'a self,
        project_id: &'a str,
        query: &'a TimeSeriesQuery,
    ) -> SourceFuture<'a, Vec<TimeSeries>> {
        Box::pin(async move {
            if query.metric_type.is_empty() {
                return Err(PulseError::request(OPERATION, "empty metric type"));
            }
            let url = format!(
                "{}/projects/{project_id}/timeSeries",
                self.client.endpoints().monitoring
            );
            let params = query_params(query, Utc::now());
            self.client
                .list_all::<TimeSeriesPage>(OPERATION, &url, &params)
                .await
        })
    }
}
