//! Graph API failure classification
//!
//! Every failed remote call is turned into exactly one [`GraphFailure`],
//! built once from the HTTP status and the `error` object of the response
//! body. Downstream code matches on [`FailureKind`] instead of re-reading
//! JSON.
//!
//! ## Error body shape
//!
//! ```json
//! {"error": {"message": "...", "type": "OAuthException", "code": 4,
//!            "error_subcode": 2207051, "fbtrace_id": "..."}}
//! ```

use std::fmt::{self, Display, Formatter};

use serde_json::Value;

/// Remote codes that signal throttling
const RATE_LIMIT_CODES: &[i64] = &[4, 17, 32, 613];

/// Subcode the remote uses for an account-wide action block
const ACTION_BLOCKED_SUBCODE: i64 = 2207051;

/// Codes that, together with a permission message, mean a scope is missing
const PERMISSION_CODES: &[i64] = &[10, 200];

/// Message fragments that mark a metric as unavailable for the entity
const UNSUPPORTED_METRIC_MARKERS: &[&str] = &[
    "not available for",
    "does not support",
    "no longer supported",
    "unsupported",
    "invalid metric",
];

/// Closed set of failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request never produced a response
    Network,
    /// Transient throttling; retryable with backoff
    RateLimited,
    /// Account-wide write suspension; never retried
    ActionBlocked,
    /// Container still processing on the remote
    MediaNotReady,
    /// Token lacks a required permission
    MissingScope,
    /// Metric cannot be served for this entity
    UnsupportedMetric,
    /// Any other remote failure
    Provider,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Network => "network_error",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ActionBlocked => "action_blocked",
            FailureKind::MediaNotReady => "media_not_ready",
            FailureKind::MissingScope => "missing_scope",
            FailureKind::UnsupportedMetric => "unsupported_metric",
            FailureKind::Provider => "provider_error",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classified failure of a single remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFailure {
    pub kind: FailureKind,
    /// HTTP status; 0 when the transport failed before a response
    pub http_status: u16,
    pub remote_code: Option<i64>,
    pub remote_subcode: Option<i64>,
    pub message: Option<String>,
    /// Remote error `type`, e.g. `OAuthException`
    pub remote_type: Option<String>,
    pub fbtrace_id: Option<String>,
}

impl GraphFailure {
    /// Failure raised before any response was received
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Network,
            http_status: 0,
            remote_code: None,
            remote_subcode: None,
            message: Some(message.into()),
            remote_type: None,
            fbtrace_id: None,
        }
    }

    /// Builds and classifies a failure from a non-2xx response
    ///
    /// `body` is the decoded response; an unparsable body arrives here as an
    /// empty object and classifies on the HTTP status alone.
    pub fn from_response(http_status: u16, body: &Value) -> Self {
        let error = body.get("error");
        let field = |name: &str| error.and_then(|e| e.get(name));

        let remote_code = field("code").and_then(as_i64);
        let remote_subcode = field("error_subcode").and_then(as_i64);
        let message = field("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                field("error_user_msg")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        let remote_type = field("type").and_then(Value::as_str).map(str::to_string);
        let fbtrace_id = field("fbtrace_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let kind = classify(http_status, remote_code, remote_subcode, message.as_deref());

        Self {
            kind,
            http_status,
            remote_code,
            remote_subcode,
            message,
            remote_type,
            fbtrace_id,
        }
    }

    /// True for the classifications the publish step retries with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::RateLimited | FailureKind::MediaNotReady
        )
    }
}

impl Display for GraphFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.kind == FailureKind::Network {
            return write!(
                f,
                "Network error: {}",
                self.message.as_deref().unwrap_or("request failed")
            );
        }

        write!(f, "Graph API error (HTTP {}", self.http_status)?;
        if let Some(code) = self.remote_code {
            write!(f, ", code {code}")?;
        }
        if let Some(subcode) = self.remote_subcode {
            write!(f, ", subcode {subcode}")?;
        }
        write!(f, ")")?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphFailure {}

/// Codes sometimes arrive as strings
fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Assigns a category from the status, remote code/subcode and message.
///
/// Message checks are case-insensitive substring matches. Action blocks are
/// checked before rate limits because they share remote code 4.
pub fn classify(
    http_status: u16,
    remote_code: Option<i64>,
    remote_subcode: Option<i64>,
    message: Option<&str>,
) -> FailureKind {
    let msg = message.unwrap_or_default().to_lowercase();
    let code_in = |codes: &[i64]| remote_code.is_some_and(|c| codes.contains(&c));

    if remote_code == Some(4)
        && (remote_subcode == Some(ACTION_BLOCKED_SUBCODE)
            || msg.contains("application request limit reached")
            || msg.contains("action is blocked"))
    {
        return FailureKind::ActionBlocked;
    }

    if msg.contains("media is not ready for publishing") {
        return FailureKind::MediaNotReady;
    }

    if code_in(RATE_LIMIT_CODES) || http_status == 429 {
        return FailureKind::RateLimited;
    }

    let mentions_permission = msg.contains("permission");
    if msg.contains("instagram_manage_insights")
        || (msg.contains("insights") && mentions_permission)
        || ((code_in(PERMISSION_CODES) || http_status == 403) && mentions_permission)
    {
        return FailureKind::MissingScope;
    }

    if UNSUPPORTED_METRIC_MARKERS.iter().any(|m| msg.contains(m)) {
        return FailureKind::UnsupportedMetric;
    }

    FailureKind::Provider
}
