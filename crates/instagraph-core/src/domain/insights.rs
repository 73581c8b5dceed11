//! Insights metric sets, periods and the top-posts ranking
//!
//! A metric set maps a metric name to a number, or to `None` when the value
//! could not be obtained. `None` is non-fatal: callers see `null` for that
//! metric and keep the rest.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Metrics requested for a single media object
pub const MEDIA_METRICS: &[&str] = &["impressions", "reach", "saved", "shares"];

/// Metrics requested for the account
pub const ACCOUNT_METRICS: &[&str] = &["reach", "profile_views", "accounts_engaged", "views"];

/// Per-entity metric values; `None` serializes as `null`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, Option<i64>>);

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set with every listed metric present and equal to zero
    pub fn zeroed(names: &[&str]) -> Self {
        let mut set = Self::new();
        for name in names {
            set.insert(*name, Some(0));
        }
        set
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<i64>) {
        self.0.insert(name.into(), value);
    }

    /// Value of a metric; `None` both when absent and when `null`
    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied().flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<i64>)> {
        self.0.iter()
    }

    /// Copies every entry of `other` into this set
    pub fn extend(&mut self, other: MetricSet) {
        self.0.extend(other.0);
    }
}

/// Reporting period for account insights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Period value the remote expects
    pub fn remote_value(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "days_28",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        };
        f.write_str(name)
    }
}

impl FromStr for Period {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(DomainError::InvalidPeriod(other.to_string())),
        }
    }
}

/// A recent post with its metrics and ranking score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPostItem {
    pub id: String,
    pub media_type: String,
    pub permalink: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub metrics: MetricSet,
    pub engagement_score: i64,
}

/// `likes + 2*comments + 3*saved + 3*shares`, missing metrics counted as 0
pub fn engagement_score(metrics: &MetricSet) -> i64 {
    let value = |name: &str| metrics.get(name).unwrap_or(0);
    value("likes") + 2 * value("comments") + 3 * value("saved") + 3 * value("shares")
}

/// Sorts by score descending, newer timestamp first on ties, then truncates
pub fn rank_top_posts(mut items: Vec<TopPostItem>, limit: usize) -> Vec<TopPostItem> {
    items.sort_by(|a, b| match b.engagement_score.cmp(&a.engagement_score) {
        Ordering::Equal => b.timestamp.cmp(&a.timestamp),
        other => other,
    });
    items.truncate(limit);
    items
}
