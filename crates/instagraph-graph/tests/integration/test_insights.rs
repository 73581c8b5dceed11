//! Integration tests for the insights cascade

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use instagraph_core::domain::Period;
use instagraph_core::{ApiError, ErrorCode};
use instagraph_graph::insights::InsightsCascade;

use crate::common::{self, ACCESS_TOKEN, IG_USER_ID};

const BULK_METRICS: &str = "impressions,reach,saved,shares";

fn metric_values(pairs: &[(&str, i64)]) -> ResponseTemplate {
    let data: Vec<_> = pairs
        .iter()
        .map(|(name, value)| json!({"name": name, "period": "lifetime", "values": [{"value": value}]}))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

fn total_value(name: &str, value: i64) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({"data": [{"name": name, "total_value": {"value": value}}]}))
}

#[tokio::test]
async fn test_media_insights_bulk_success() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", BULK_METRICS))
        .respond_with(metric_values(&[
            ("impressions", 120),
            ("reach", 90),
            ("saved", 4),
            ("shares", 2),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let metrics = cascade.media_insights("m1").await.expect("media_insights failed");

    assert_eq!(metrics.len(), 4);
    assert_eq!(metrics.get("impressions"), Some(120));
    assert_eq!(metrics.get("shares"), Some(2));
}

#[tokio::test]
async fn test_media_insights_degrades_per_metric() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", BULK_METRICS))
        .respond_with(common::unsupported_metric("impressions"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", "impressions"))
        .respond_with(common::unsupported_metric("impressions"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", "reach"))
        .respond_with(common::graph_error(400, 1, None, "An unknown error has occurred"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", "saved"))
        .respond_with(metric_values(&[("saved", 3)]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", "shares"))
        .respond_with(metric_values(&[("shares", 1)]))
        .expect(1)
        .mount(&server)
        .await;

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let metrics = cascade.media_insights("m1").await.expect("degraded read failed");

    assert!(metrics.contains("impressions"));
    assert_eq!(metrics.get("impressions"), None);
    assert!(metrics.contains("reach"));
    assert_eq!(metrics.get("reach"), None);
    assert_eq!(metrics.get("saved"), Some(3));
    assert_eq!(metrics.get("shares"), Some(1));

    let rendered = serde_json::to_value(&metrics).unwrap();
    assert_eq!(rendered["impressions"], json!(null));
}

#[tokio::test]
async fn test_bulk_missing_scope_is_validation_error() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .respond_with(common::missing_insights_scope())
        .expect(1)
        .mount(&server)
        .await;

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let err = cascade.media_insights("m1").await.unwrap_err();
    assert!(err.is_validation());

    let api: ApiError = err.into();
    assert_eq!(api.code, ErrorCode::Validation);
    assert_eq!(
        api.detail("required_scope"),
        Some(&json!("instagram_manage_insights"))
    );
}

#[tokio::test]
async fn test_per_metric_missing_scope_aborts() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", BULK_METRICS))
        .respond_with(common::unsupported_metric("impressions"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", "impressions"))
        .respond_with(common::missing_insights_scope())
        .expect(1)
        .mount(&server)
        .await;
    for metric in ["reach", "saved", "shares"] {
        Mock::given(method("GET"))
            .and(path("/m1/insights"))
            .and(query_param("metric", metric))
            .respond_with(metric_values(&[(metric, 1)]))
            .expect(0)
            .mount(&server)
            .await;
    }

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let err = cascade.media_insights("m1").await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_account_month_uses_days_28_total_value() {
    let (server, client) = common::setup_graph_mock().await;

    for (metric, value) in [
        ("reach", 500),
        ("profile_views", 40),
        ("accounts_engaged", 75),
        ("views", 2_000),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/{IG_USER_ID}/insights")))
            .and(query_param("metric", metric))
            .and(query_param("period", "days_28"))
            .and(query_param("metric_type", "total_value"))
            .respond_with(total_value(metric, value))
            .expect(1)
            .mount(&server)
            .await;
    }

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let metrics = cascade
        .account_insights(IG_USER_ID, Period::Month)
        .await
        .expect("account_insights failed");

    assert_eq!(metrics.get("reach"), Some(500));
    assert_eq!(metrics.get("profile_views"), Some(40));
    assert_eq!(metrics.get("accounts_engaged"), Some(75));
    assert_eq!(metrics.get("views"), Some(2_000));
}

#[tokio::test]
async fn test_account_metric_falls_back_through_shapes() {
    let (server, client) = common::setup_graph_mock().await;
    let insights_path = format!("/{IG_USER_ID}/insights");

    // reach: first shape rejected, second accepted
    Mock::given(method("GET"))
        .and(path(insights_path.clone()))
        .and(query_param("metric", "reach"))
        .and(query_param("period", "day"))
        .and(query_param("metric_type", "total_value"))
        .respond_with(common::unsupported_metric("reach"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(insights_path.clone()))
        .and(query_param("metric", "reach"))
        .and(query_param("metric_type", "total_value"))
        .and(query_param_is_missing("period"))
        .respond_with(total_value("reach", 321))
        .expect(1)
        .mount(&server)
        .await;

    // views: every shape rejected
    Mock::given(method("GET"))
        .and(path(insights_path.clone()))
        .and(query_param("metric", "views"))
        .respond_with(common::graph_error(400, 100, None, "(#100) Invalid parameter"))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(insights_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"name": "profile_views", "total_value": {"value": 12}},
            {"name": "accounts_engaged", "total_value": {"value": 30}}
        ]})))
        .mount(&server)
        .await;

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let metrics = cascade
        .account_insights(IG_USER_ID, Period::Day)
        .await
        .expect("account_insights failed");

    assert_eq!(metrics.get("reach"), Some(321));
    assert_eq!(metrics.get("profile_views"), Some(12));
    assert_eq!(metrics.get("accounts_engaged"), Some(30));
    assert!(metrics.contains("views"));
    assert_eq!(metrics.get("views"), None);
}

#[tokio::test]
async fn test_account_missing_scope_aborts() {
    let (server, client) = common::setup_graph_mock().await;
    let insights_path = format!("/{IG_USER_ID}/insights");

    Mock::given(method("GET"))
        .and(path(insights_path.clone()))
        .and(query_param("metric", "reach"))
        .respond_with(common::missing_insights_scope())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(insights_path))
        .respond_with(total_value("views", 1))
        .expect(0)
        .mount(&server)
        .await;

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let err = cascade
        .account_insights(IG_USER_ID, Period::Week)
        .await
        .unwrap_err();

    let api: ApiError = err.into();
    assert_eq!(api.code, ErrorCode::Validation);
    assert_eq!(
        api.detail("required_scope"),
        Some(&json!("instagram_manage_insights"))
    );
}

#[tokio::test]
async fn test_top_posts_ranks_recent_media() {
    let (server, client) = common::setup_graph_mock().await;
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/{IG_USER_ID}/media")))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "a", "media_type": "IMAGE", "permalink": "https://instagram.test/p/a",
                 "timestamp": "2024-05-09T08:00:00+0000", "like_count": 10, "comments_count": 2},
                {"id": "b", "media_type": "VIDEO", "permalink": "https://instagram.test/p/b",
                 "timestamp": "2024-05-08T08:00:00+0000", "like_count": 5, "comments_count": 2,
                 "caption": "behind the scenes"},
                {"id": "old", "media_type": "IMAGE", "permalink": "https://instagram.test/p/old",
                 "timestamp": "2024-04-01T08:00:00+0000", "like_count": 900, "comments_count": 90},
                {"id": "undated", "media_type": "IMAGE", "like_count": 900}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/insights"))
        .respond_with(metric_values(&[
            ("impressions", 300),
            ("reach", 200),
            ("saved", 1),
            ("shares", 0),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/insights"))
        .respond_with(metric_values(&[
            ("impressions", 150),
            ("reach", 100),
            ("saved", 2),
            ("shares", 1),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    for id in ["old", "undated"] {
        Mock::given(method("GET"))
            .and(path(format!("/{id}/insights")))
            .respond_with(metric_values(&[]))
            .expect(0)
            .mount(&server)
            .await;
    }

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let top = cascade
        .top_posts(IG_USER_ID, 7, 5, 50, now)
        .await
        .expect("top_posts failed");

    let ranked: Vec<_> = top.iter().map(|p| (p.id.as_str(), p.engagement_score)).collect();
    assert_eq!(ranked, vec![("b", 18), ("a", 17)]);
    assert_eq!(top[0].metrics.get("comments"), Some(2));
    assert_eq!(top[0].caption.as_deref(), Some("behind the scenes"));
    assert_eq!(top[1].metrics.get("impressions"), Some(300));
}

#[tokio::test]
async fn test_top_posts_tolerates_failed_media_insights() {
    let (server, client) = common::setup_graph_mock().await;
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/{IG_USER_ID}/media")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "a", "media_type": "IMAGE", "permalink": "https://instagram.test/p/a",
                 "timestamp": "2024-05-09T08:00:00+0000", "like_count": 7, "comments_count": 1}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/insights"))
        .respond_with(common::graph_error(500, 2, None, "Service temporarily unavailable"))
        .mount(&server)
        .await;

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let top = cascade
        .top_posts(IG_USER_ID, 7, 5, 50, now)
        .await
        .expect("top_posts failed");

    assert_eq!(top.len(), 1);
    assert_eq!(top[0].engagement_score, 9);
    assert!(top[0].metrics.contains("saved"));
    assert_eq!(top[0].metrics.get("saved"), None);
}

#[tokio::test]
async fn test_top_posts_rejects_zero_window() {
    let (_server, client) = common::setup_graph_mock().await;
    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);

    let err = cascade
        .top_posts(IG_USER_ID, 0, 5, 50, Utc::now())
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_single_unsupported_metric_is_null_and_others_kept() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", BULK_METRICS))
        .respond_with(common::unsupported_metric("reach"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1/insights"))
        .and(query_param("metric", "reach"))
        .respond_with(common::unsupported_metric("reach"))
        .expect(1)
        .mount(&server)
        .await;
    for (metric, value) in [("impressions", 250), ("saved", 6), ("shares", 2)] {
        Mock::given(method("GET"))
            .and(path("/m1/insights"))
            .and(query_param("metric", metric))
            .respond_with(metric_values(&[(metric, value)]))
            .expect(1)
            .mount(&server)
            .await;
    }

    let cascade = InsightsCascade::new(&client, ACCESS_TOKEN);
    let metrics = cascade.media_insights("m1").await.expect("degraded read failed");

    assert!(metrics.contains("reach"));
    assert_eq!(metrics.get("reach"), None);
    assert_eq!(metrics.get("impressions"), Some(250));
    assert_eq!(metrics.get("saved"), Some(6));
    assert_eq!(metrics.get("shares"), Some(2));
}
