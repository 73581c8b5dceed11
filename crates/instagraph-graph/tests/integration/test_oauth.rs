//! Integration tests for the OAuth PKCE flow
//!
//! Drives `auth.start` and `auth.finish` through the provider against a
//! mocked token endpoint and pages listing.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use instagraph_core::ports::{ICredentialStore, IMediaProvider, MemoryCredentialStore, ProviderContext};
use instagraph_core::ErrorCode;
use instagraph_graph::provider::GraphMediaProvider;

use crate::common::{self, ACCOUNT, IG_USER_ID};

fn query_map(url: &str) -> HashMap<String, String> {
    Url::parse(url)
        .expect("login_url is not a URL")
        .query_pairs()
        .into_owned()
        .collect()
}

fn accounts_with_instagram() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": [
            {"id": "page-1", "name": "Unlinked page"},
            {"id": "page-2", "name": "Shop page",
             "instagram_business_account": {"id": IG_USER_ID}}
        ]
    }))
}

async fn setup() -> (
    wiremock::MockServer,
    GraphMediaProvider,
    Arc<MemoryCredentialStore>,
    ProviderContext,
) {
    let (server, _) = common::setup_graph_mock().await;
    let provider = GraphMediaProvider::new(common::test_config(&server));
    let store = Arc::new(MemoryCredentialStore::new());
    let ctx = ProviderContext::new(ACCOUNT, store.clone());
    (server, provider, store, ctx)
}

#[tokio::test]
async fn test_full_pkce_flow_stores_credential() {
    let (server, provider, store, ctx) = setup().await;

    let start = provider.auth_start(&ctx, None).await.into_result().expect("auth_start failed");
    let query = query_map(&start.login_url);
    assert!(start.login_url.starts_with(&format!("{}/dialog/oauth", server.uri())));
    assert_eq!(query.get("client_id").map(String::as_str), Some("app-123"));
    assert_eq!(query.get("state"), Some(&start.state));
    assert_eq!(query.get("code_challenge_method").map(String::as_str), Some("S256"));
    assert!(query.get("scope").is_some_and(|s| s.contains("instagram_manage_insights")));

    let pending = store
        .load_pending_auth(ACCOUNT)
        .await
        .unwrap()
        .expect("pending challenge not saved");

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .and(query_param("client_id", "app-123"))
        .and(query_param("client_secret", "app-secret"))
        .and(query_param("code", "auth-code"))
        .and(query_param("code_verifier", pending.code_verifier.as_str()))
        .and(query_param("redirect_uri", start.redirect_uri.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "token_type": "bearer",
            "expires_in": 5_183_944
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/accounts"))
        .and(query_param("access_token", "fresh-token"))
        .respond_with(accounts_with_instagram())
        .expect(1)
        .mount(&server)
        .await;

    let summary = provider
        .auth_finish(&ctx, "auth-code", &start.state)
        .await
        .into_result()
        .expect("auth_finish failed");

    assert!(summary.authenticated);
    assert_eq!(summary.ig_user_id.as_deref(), Some(IG_USER_ID));
    assert!(summary.expires_at.is_some());
    assert!(!summary.expired);

    let credential = store.load_credential(ACCOUNT).await.unwrap().expect("no credential");
    assert_eq!(credential.access_token, "fresh-token");
    assert!(store.load_pending_auth(ACCOUNT).await.unwrap().is_none());
}

#[tokio::test]
async fn test_finish_with_wrong_state_keeps_challenge() {
    let (server, provider, store, ctx) = setup().await;

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    provider.auth_start(&ctx, None).await.into_result().expect("auth_start failed");
    let outcome = provider.auth_finish(&ctx, "auth-code", "forged-state").await;

    let error = outcome.error().expect("expected failure");
    assert_eq!(error.code, ErrorCode::Validation);
    assert_eq!(error.detail("reason"), Some(&json!("state_mismatch")));
    assert!(store.load_pending_auth(ACCOUNT).await.unwrap().is_some());
}

#[tokio::test]
async fn test_finish_without_start_requires_auth() {
    let (_server, provider, _store, ctx) = setup().await;

    let outcome = provider.auth_finish(&ctx, "auth-code", "any-state").await;
    assert_eq!(outcome.error().map(|e| e.code), Some(ErrorCode::AuthRequired));
}

#[tokio::test]
async fn test_rejected_exchange_is_classified_and_not_retried() {
    let (server, provider, store, ctx) = setup().await;

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .respond_with(common::graph_error(
            400,
            100,
            Some(36009),
            "This authorization code has been used",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let start = provider.auth_start(&ctx, None).await.into_result().expect("auth_start failed");
    let outcome = provider.auth_finish(&ctx, "used-code", &start.state).await;

    let error = outcome.error().expect("expected failure");
    assert_eq!(error.code, ErrorCode::Provider);
    assert_eq!(error.detail("remote_subcode"), Some(&json!(36009)));
    assert!(store.load_credential(ACCOUNT).await.unwrap().is_none());
}

#[tokio::test]
async fn test_no_linked_instagram_account_is_validation() {
    let (server, provider, store, ctx) = setup().await;

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh-token"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/accounts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": "page-1", "name": "Unlinked page"}]})),
        )
        .mount(&server)
        .await;

    let start = provider.auth_start(&ctx, None).await.into_result().expect("auth_start failed");
    let outcome = provider.auth_finish(&ctx, "auth-code", &start.state).await;

    assert_eq!(outcome.error().map(|e| e.code), Some(ErrorCode::Validation));
    assert!(store.load_credential(ACCOUNT).await.unwrap().is_none());
}

#[tokio::test]
async fn test_redirect_override_is_recorded() {
    let (_server, provider, store, ctx) = setup().await;

    let start = provider
        .auth_start(&ctx, Some("http://127.0.0.1:9000/cb"))
        .await
        .into_result()
        .expect("auth_start failed");

    assert_eq!(start.redirect_uri, "http://127.0.0.1:9000/cb");
    assert_eq!(
        query_map(&start.login_url).get("redirect_uri").map(String::as_str),
        Some("http://127.0.0.1:9000/cb")
    );
    let pending = store.load_pending_auth(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(pending.redirect_uri, "http://127.0.0.1:9000/cb");
}

#[tokio::test]
async fn test_oversized_token_lifetime_is_dropped() {
    let (server, provider, store, ctx) = setup().await;

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 10_000_000_000_000_000u64
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/accounts"))
        .respond_with(accounts_with_instagram())
        .mount(&server)
        .await;

    let start = provider.auth_start(&ctx, None).await.into_result().expect("auth_start failed");
    let summary = provider
        .auth_finish(&ctx, "auth-code", &start.state)
        .await
        .into_result()
        .expect("auth_finish failed");

    assert!(summary.authenticated);
    assert!(summary.expires_at.is_none());
    let credential = store.load_credential(ACCOUNT).await.unwrap().expect("no credential");
    assert_eq!(credential.access_token, "fresh-token");
}
