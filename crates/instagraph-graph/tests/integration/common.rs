//! Shared test helpers for Graph API integration tests
//!
//! Provides wiremock-based mock server setup, canned Graph error bodies and
//! a recording [`Sleeper`] so retry and polling schedules can be asserted
//! without real waiting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use wiremock::{MockServer, ResponseTemplate};

use instagraph_core::config::{Config, ConfigBuilder};
use instagraph_core::domain::Credential;
use instagraph_core::ports::{MemoryCredentialStore, ProviderContext};
use instagraph_graph::client::GraphClient;
use instagraph_graph::provider::GraphMediaProvider;
use instagraph_graph::publish::{PollPolicy, Sleeper};

pub const IG_USER_ID: &str = "17841400000000001";
pub const ACCESS_TOKEN: &str = "test-access-token";
pub const ACCOUNT: &str = "brand";

/// Installs a test log writer when `RUST_LOG` is set
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Starts a mock server and returns a client pointing at it
pub async fn setup_graph_mock() -> (MockServer, GraphClient) {
    init_tracing();
    let server = MockServer::start().await;
    let client = GraphClient::with_base_url(server.uri());
    (server, client)
}

/// Graph-style error response
pub fn graph_error(status: u16, code: i64, subcode: Option<i64>, message: &str) -> ResponseTemplate {
    let mut error = json!({
        "message": message,
        "type": "OAuthException",
        "code": code,
        "fbtrace_id": "AxTestTrace"
    });
    if let Some(sub) = subcode {
        error["error_subcode"] = json!(sub);
    }
    ResponseTemplate::new(status).set_body_json(json!({ "error": error }))
}

pub fn action_blocked() -> ResponseTemplate {
    graph_error(400, 4, Some(2207051), "Application request limit reached")
}

pub fn media_not_ready() -> ResponseTemplate {
    graph_error(
        400,
        9007,
        Some(2207027),
        "Media ID is not available: The media is not ready for publishing, please wait for a moment",
    )
}

pub fn missing_insights_scope() -> ResponseTemplate {
    graph_error(
        400,
        10,
        None,
        "(#10) Application does not have permission for this action",
    )
}

pub fn unsupported_metric(metric: &str) -> ResponseTemplate {
    graph_error(
        400,
        100,
        None,
        &format!("(#100) The {metric} metric is no longer supported"),
    )
}

pub fn status_body(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status_code": code, "status": code }))
}

/// Records every requested delay and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Three polls, ten milliseconds apart
pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        max_attempts: 3,
        interval: Duration::from_millis(10),
    }
}

/// Config aimed at `server` with OAuth credentials and short polling
pub fn test_config(server: &MockServer) -> Config {
    ConfigBuilder::new()
        .base_url(server.uri())
        .request_timeout_ms(2_000)
        .client_id("app-123")
        .client_secret("app-secret")
        .authorize_url(format!("{}/dialog/oauth", server.uri()))
        .poll_max_attempts(3)
        .poll_interval_ms(10)
        .build()
}

/// Provider with a recording sleeper plus a context holding a valid credential
pub fn provider_with_credential(
    server: &MockServer,
) -> (GraphMediaProvider, ProviderContext, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let provider = GraphMediaProvider::new(test_config(server)).with_sleeper(sleeper.clone());
    let store = Arc::new(MemoryCredentialStore::with_credential(
        ACCOUNT,
        Credential::new(ACCESS_TOKEN, IG_USER_ID),
    ));
    (provider, ProviderContext::new(ACCOUNT, store), sleeper)
}
