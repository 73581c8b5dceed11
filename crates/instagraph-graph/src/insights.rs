//! Insights cascade
//!
//! Reads media and account metrics, degrading to `null` values instead of
//! failing when the remote refuses individual metrics. A missing scope is
//! the one failure that always aborts: no amount of retrying with other
//! parameters will grant a permission.
//!
//! ## Response shape
//!
//! ```json
//! {"data": [{"name": "reach", "period": "day",
//!            "values": [{"value": 12, "end_time": "..."}]},
//!           {"name": "views", "total_value": {"value": 340}}]}
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use instagraph_core::domain::{
    engagement_score, rank_top_posts, MetricSet, Period, TopPostItem, ACCOUNT_METRICS,
    MEDIA_METRICS,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::{FailureKind, GraphFailure};
use crate::client::{GraphClient, JsonObject};
use crate::paging;
use crate::GraphError;

/// Graph timestamp format, e.g. `2024-05-01T12:00:00+0000`
const GRAPH_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Insights reads for one access token
pub struct InsightsCascade<'a> {
    client: &'a GraphClient,
    access_token: &'a str,
}

impl<'a> InsightsCascade<'a> {
    pub fn new(client: &'a GraphClient, access_token: &'a str) -> Self {
        Self {
            client,
            access_token,
        }
    }

    async fn fetch_metrics(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<HashMap<String, Option<i64>>, GraphFailure> {
        let body = self.client.get(path, params, Some(self.access_token)).await?;
        Ok(extract_metric_values(&body))
    }

    /// `impressions`, `reach`, `saved` and `shares` for one media object
    ///
    /// One bulk call first. If the remote rejects a metric, each metric is
    /// fetched alone and the ones that still fail become `null`.
    pub async fn media_insights(&self, media_id: &str) -> Result<MetricSet, GraphError> {
        let path = format!("/{media_id}/insights");
        let bulk = [("metric", MEDIA_METRICS.join(","))];

        let failure = match self.fetch_metrics(&path, &bulk).await {
            Ok(values) => return Ok(collect(MEDIA_METRICS, &values)),
            Err(failure) => failure,
        };

        if failure.kind != FailureKind::UnsupportedMetric {
            return Err(failure.into());
        }

        debug!(media_id, "Bulk insights rejected, fetching metrics one by one");
        let mut metrics = MetricSet::new();
        for metric in MEDIA_METRICS {
            let single = [("metric", metric.to_string())];
            let value = match self.fetch_metrics(&path, &single).await {
                Ok(values) => values.get(*metric).copied().flatten(),
                Err(failure) if failure.kind == FailureKind::MissingScope => {
                    return Err(failure.into());
                }
                Err(failure) => {
                    debug!(media_id, metric, kind = %failure.kind, "Metric unavailable");
                    None
                }
            };
            metrics.insert(*metric, value);
        }
        Ok(metrics)
    }

    /// `reach`, `profile_views`, `accounts_engaged` and `views` for the account
    pub async fn account_insights(
        &self,
        ig_user_id: &str,
        period: Period,
    ) -> Result<MetricSet, GraphError> {
        let mut metrics = MetricSet::new();
        for metric in ACCOUNT_METRICS {
            let value = self.account_metric(ig_user_id, metric, period).await?;
            metrics.insert(*metric, value);
        }
        Ok(metrics)
    }

    /// Tries up to three parameter shapes for one account metric
    async fn account_metric(
        &self,
        ig_user_id: &str,
        metric: &str,
        period: Period,
    ) -> Result<Option<i64>, GraphError> {
        let path = format!("/{ig_user_id}/insights");
        let period = period.remote_value().to_string();
        let shapes = [
            vec![
                ("period", period.clone()),
                ("metric_type", "total_value".to_string()),
            ],
            vec![("metric_type", "total_value".to_string())],
            vec![("period", period)],
        ];

        for (shape, extra) in shapes.into_iter().enumerate() {
            let mut params = vec![("metric", metric.to_string())];
            params.extend(extra);

            match self.fetch_metrics(&path, &params).await {
                Ok(values) => return Ok(values.get(metric).copied().flatten()),
                Err(failure) => {
                    let err = GraphError::from(failure);
                    if err.is_validation() {
                        return Err(err);
                    }
                    debug!(metric, shape, error = %err, "Account metric shape rejected");
                }
            }
        }

        debug!(metric, "Account metric unavailable with every shape");
        Ok(None)
    }

    /// Ranks media published in the last `days` days by engagement score
    ///
    /// Scans one listing page of up to `fetch_limit` items.
    pub async fn top_posts(
        &self,
        ig_user_id: &str,
        days: u32,
        limit: usize,
        fetch_limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<TopPostItem>, GraphError> {
        if days == 0 {
            return Err(GraphError::validation("days must be at least 1"));
        }
        if limit == 0 {
            return Err(GraphError::validation("limit must be at least 1"));
        }

        let page =
            paging::list_media(self.client, self.access_token, ig_user_id, fetch_limit, None)
                .await?;
        let cutoff = now - Duration::days(i64::from(days));

        let mut candidates = Vec::new();
        for media in page.items {
            let Some(timestamp) = media.timestamp.as_deref().and_then(parse_graph_timestamp)
            else {
                debug!(media_id = %media.id, "Skipping media without a usable timestamp");
                continue;
            };
            if timestamp < cutoff {
                continue;
            }

            let mut metrics = match self.media_insights(&media.id).await {
                Ok(metrics) => metrics,
                Err(err) if err.is_validation() => return Err(err),
                Err(err) => {
                    warn!(media_id = %media.id, error = %err, "Insights unavailable for media");
                    let mut empty = MetricSet::new();
                    for metric in MEDIA_METRICS {
                        empty.insert(*metric, None);
                    }
                    empty
                }
            };
            metrics.insert("likes", media.like_count);
            metrics.insert("comments", media.comments_count);

            let score = engagement_score(&metrics);
            candidates.push(TopPostItem {
                id: media.id,
                media_type: media.media_type.unwrap_or_default(),
                permalink: media.permalink.unwrap_or_default(),
                timestamp,
                caption: media.caption,
                metrics,
                engagement_score: score,
            });
        }

        debug!(
            ig_user_id,
            candidates = candidates.len(),
            days,
            "Ranking recent media"
        );
        Ok(rank_top_posts(candidates, limit))
    }
}

fn collect(names: &[&str], values: &HashMap<String, Option<i64>>) -> MetricSet {
    let mut metrics = MetricSet::new();
    for name in names {
        metrics.insert(*name, values.get(*name).copied().flatten());
    }
    metrics
}

/// Reads every `data[]` entry into `name -> value`
///
/// `total_value.value` wins over the last `values[].value`. Non-numeric
/// values (breakdown objects) read as `None`.
pub fn extract_metric_values(body: &JsonObject) -> HashMap<String, Option<i64>> {
    let mut values = HashMap::new();
    let Some(entries) = body.get("data").and_then(Value::as_array) else {
        return values;
    };

    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let total = entry
            .get("total_value")
            .and_then(|t| t.get("value"))
            .and_then(as_number);
        let latest = entry
            .get("values")
            .and_then(Value::as_array)
            .and_then(|v| v.last())
            .and_then(|v| v.get("value"))
            .and_then(as_number);
        values.insert(name.to_string(), total.or(latest));
    }
    values
}

fn as_number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

/// Parses `2024-05-01T12:00:00+0000` as well as RFC 3339
pub fn parse_graph_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, GRAPH_TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
