//! Instagram Graph API transport
//!
//! Issues one HTTP request per call, bounded by a timeout, and turns every
//! outcome into either a decoded JSON object or a classified
//! [`GraphFailure`]. Retrying is left to callers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use instagraph_graph::client::GraphClient;
//!
//! # async fn example() -> Result<(), instagraph_graph::classify::GraphFailure> {
//! let client = GraphClient::new();
//! let profile = client.get_profile("access-token", "17841400000000000").await?;
//! println!("{:?}", profile.get("username"));
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use instagraph_core::config::{GraphConfig, DEFAULT_GRAPH_BASE_URL};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::classify::GraphFailure;

/// Decoded response object
pub type JsonObject = Map<String, Value>;

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Profile fields requested by [`GraphClient::get_profile`]
pub const PROFILE_FIELDS: &str = "id,username,name,followers_count,follows_count,media_count";

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Instagram Graph API calls
///
/// Holds no credential: the access token travels with each request so one
/// client can serve every account.
#[derive(Debug, Clone)]
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Versioned base URL, without trailing slash
    base_url: String,
    /// Upper bound for a single request including body read
    timeout: Duration,
}

impl Default for GraphClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphClient {
    /// Creates a client against the default versioned endpoint
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_GRAPH_BASE_URL)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a client from the `graph` config section
    pub fn from_config(config: &GraphConfig) -> Self {
        Self::with_base_url(config.base_url.clone())
            .with_timeout(Duration::from_millis(config.request_timeout_ms))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves `path` against the base URL; absolute URLs pass through
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Performs a single request
    ///
    /// GET sends `params` and the token in the query string; every other
    /// method sends them as a form body. A 2xx body that is not a JSON object
    /// decodes as an empty object.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        access_token: Option<&str>,
    ) -> Result<JsonObject, GraphFailure> {
        let url = self.url_for(path);

        let mut pairs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        if let Some(token) = access_token {
            pairs.push(("access_token", token));
        }

        let builder = self.client.request(method.clone(), &url);
        let builder = if method == Method::GET {
            builder.query(&pairs)
        } else {
            builder.form(&pairs)
        };

        debug!(method = %method, path, "Graph request");

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => {
                warn!(method = %method, path, timeout_ms = self.timeout.as_millis() as u64, "Graph request timed out");
                return Err(GraphFailure::network(format!(
                    "request timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
            Ok(Err(e)) => {
                warn!(method = %method, path, error = %e, "Graph request failed");
                return Err(GraphFailure::network(e.to_string()));
            }
            Ok(Ok(exchange)) => exchange,
        };

        let body = decode_object(&text);

        if !status.is_success() {
            let failure = GraphFailure::from_response(status.as_u16(), &Value::Object(body));
            debug!(
                method = %method,
                path,
                status = status.as_u16(),
                kind = %failure.kind,
                "Graph request rejected"
            );
            return Err(failure);
        }

        Ok(body)
    }

    pub async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
        access_token: Option<&str>,
    ) -> Result<JsonObject, GraphFailure> {
        self.request(Method::GET, path, params, access_token).await
    }

    pub async fn post(
        &self,
        path: &str,
        params: &[(&str, String)],
        access_token: Option<&str>,
    ) -> Result<JsonObject, GraphFailure> {
        self.request(Method::POST, path, params, access_token).await
    }

    /// Retrieves the professional account profile
    pub async fn get_profile(
        &self,
        access_token: &str,
        ig_user_id: &str,
    ) -> Result<JsonObject, GraphFailure> {
        debug!(ig_user_id, "Fetching account profile");
        self.get(
            &format!("/{ig_user_id}"),
            &[("fields", PROFILE_FIELDS.to_string())],
            Some(access_token),
        )
        .await
    }
}

/// Parses a response body, falling back to an empty object
fn decode_object(text: &str) -> JsonObject {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => JsonObject::new(),
    }
}
