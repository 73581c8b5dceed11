//! Configuration module for Instagraph.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default Graph API base (versioned)
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v21.0";

/// Default browser-facing authorization endpoint
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.facebook.com/v21.0/dialog/oauth";

/// Default redirect URI registered for the app
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8787/callback";

/// Scopes requested by the authorization URL
pub const REQUIRED_SCOPES: &[&str] = &[
    "instagram_basic",
    "instagram_content_publish",
    "instagram_manage_insights",
    "pages_show_list",
    "pages_read_engagement",
    "business_management",
];

/// Environment variable names for overrides
pub const ENV_CLIENT_ID: &str = "INSTAGRAPH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "INSTAGRAPH_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "INSTAGRAPH_REDIRECT_URI";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "INSTAGRAPH_REQUEST_TIMEOUT_MS";
pub const ENV_GRAPH_BASE_URL: &str = "INSTAGRAPH_GRAPH_BASE_URL";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Instagraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub oauth: OAuthConfig,
    pub publish: PublishConfig,
    pub insights: InsightsConfig,
    pub logging: LoggingConfig,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Versioned Graph API base URL.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

/// OAuth settings. Client id and secret stay `None` until the app is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub scopes: Vec<String>,
}

/// Container polling and publish retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Polls before a container is declared timed out.
    pub poll_max_attempts: u32,
    /// Milliseconds between polls.
    pub poll_interval_ms: u64,
    /// Delays before each publish retry, in milliseconds.
    pub retry_backoff_ms: Vec<u64>,
}

/// Insights settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    /// How many recent media the top-posts ranking fetches before filtering.
    pub top_posts_fetch_limit: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/instagraph/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("instagraph")
            .join("config.yaml")
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ValidationError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup (the environment in production).
    ///
    /// Empty values are ignored. An unparsable timeout is an error.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = get(ENV_CLIENT_ID) {
            self.oauth.client_id = Some(id);
        }
        if let Some(secret) = get(ENV_CLIENT_SECRET) {
            self.oauth.client_secret = Some(secret);
        }
        if let Some(uri) = get(ENV_REDIRECT_URI) {
            self.oauth.redirect_uri = uri;
        }
        if let Some(base) = get(ENV_GRAPH_BASE_URL) {
            self.graph.base_url = base;
        }
        if let Some(raw) = get(ENV_REQUEST_TIMEOUT_MS) {
            self.graph.request_timeout_ms =
                raw.trim().parse().map_err(|_| ValidationError {
                    field: ENV_REQUEST_TIMEOUT_MS.into(),
                    message: format!("not a number of milliseconds: {raw}"),
                })?;
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            request_timeout_ms: 15_000,
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            scopes: REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            poll_max_attempts: 24,
            poll_interval_ms: 5_000,
            retry_backoff_ms: vec![15_000, 45_000, 120_000],
        }
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            top_posts_fetch_limit: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"graph.request_timeout_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. OAuth credentials
    /// are not required here; they are checked when the OAuth flow runs.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- graph ---
        if !is_http_url(&self.graph.base_url) {
            errors.push(ValidationError {
                field: "graph.base_url".into(),
                message: format!("must be an http(s) URL: {}", self.graph.base_url),
            });
        }
        if self.graph.request_timeout_ms == 0 {
            errors.push(ValidationError {
                field: "graph.request_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- oauth ---
        if !is_http_url(&self.oauth.redirect_uri) {
            errors.push(ValidationError {
                field: "oauth.redirect_uri".into(),
                message: format!("must be an http(s) URL: {}", self.oauth.redirect_uri),
            });
        }
        if !is_http_url(&self.oauth.authorize_url) {
            errors.push(ValidationError {
                field: "oauth.authorize_url".into(),
                message: format!("must be an http(s) URL: {}", self.oauth.authorize_url),
            });
        }
        if self.oauth.scopes.is_empty() {
            errors.push(ValidationError {
                field: "oauth.scopes".into(),
                message: "must list at least one scope".into(),
            });
        }

        // --- publish ---
        if self.publish.poll_max_attempts == 0 {
            errors.push(ValidationError {
                field: "publish.poll_max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- insights ---
        if self.insights.top_posts_fetch_limit == 0 {
            errors.push(ValidationError {
                field: "insights.top_posts_fetch_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use instagraph_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .client_id("1234")
///     .client_secret("shh")
///     .request_timeout_ms(5_000)
///     .build();
/// assert_eq!(config.graph.request_timeout_ms, 5_000);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- graph ---

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.graph.base_url = url.into();
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.graph.request_timeout_ms = ms;
        self
    }

    // --- oauth ---

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.oauth.client_id = Some(id.into());
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.oauth.client_secret = Some(secret.into());
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.oauth.redirect_uri = uri.into();
        self
    }

    pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
        self.config.oauth.authorize_url = url.into();
        self
    }

    // --- publish ---

    pub fn poll_max_attempts(mut self, n: u32) -> Self {
        self.config.publish.poll_max_attempts = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.publish.poll_interval_ms = ms;
        self
    }

    pub fn retry_backoff_ms(mut self, schedule: Vec<u64>) -> Self {
        self.config.publish.retry_backoff_ms = schedule;
        self
    }

    // --- insights ---

    pub fn top_posts_fetch_limit(mut self, n: u32) -> Self {
        self.config.insights.top_posts_fetch_limit = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
