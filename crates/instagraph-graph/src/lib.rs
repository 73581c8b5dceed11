//! Instagraph Graph - Instagram Graph API adapter
//!
//! Provides an async client for:
//! - OAuth2 authentication (Authorization Code with PKCE)
//! - Media publishing through containers, readiness polling and backoff
//! - Insights reads with graceful degradation
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE authorization URL and code exchange
//! - [`classify`] - Failure classification of remote responses
//! - [`client`] - Single-request HTTP transport
//! - [`insights`] - Media/account insights cascade and top-posts ranking
//! - [`paging`] - Media listing, cursors and URL redaction
//! - [`provider`] - [`IMediaProvider`] implementation returning `Outcome`s
//! - [`publish`] - Container creation, polling and publish retries
//!
//! [`IMediaProvider`]: instagraph_core::ports::IMediaProvider

pub mod auth;
pub mod classify;
pub mod client;
pub mod insights;
pub mod paging;
pub mod provider;
pub mod publish;

use instagraph_core::domain::DomainError;
use instagraph_core::ApiError;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::classify::{FailureKind, GraphFailure};

/// Seconds callers should wait after an action block
pub const ACTION_BLOCK_RETRY_AFTER_SECS: u64 = 3600;

/// Scope reported with every missing-scope failure
///
/// Publish-path permission failures (e.g. code 200 on `media_publish`, where
/// `instagram_content_publish` is the scope actually lacking) report this
/// scope too.
pub const INSIGHTS_SCOPE: &str = "instagram_manage_insights";

/// Errors raised inside the adapter before they become an `Outcome`
#[derive(Debug, Error)]
pub enum GraphError {
    /// A remote call failed; carries its classification
    #[error(transparent)]
    Remote(#[from] GraphFailure),

    /// A container reached the remote `ERROR`/`EXPIRED` status
    #[error("Container {creation_id} failed processing (status_code {status_code})")]
    ContainerFailed {
        creation_id: String,
        status_code: String,
        /// Remote `status` detail, e.g. `Error: 2207026`
        status: Option<String>,
    },

    /// Polling exhausted without a terminal status
    #[error("Container {creation_id} not ready after {attempts} status checks")]
    ContainerTimedOut { creation_id: String, attempts: u32 },

    /// No usable credential
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Bad input or state mismatch
    #[error("{message}")]
    Validation {
        message: String,
        details: Map<String, Value>,
    },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A 2xx response lacked an expected field
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The credential store failed
    #[error("Credential store error: {0:#}")]
    Storage(anyhow::Error),
}

impl GraphError {
    pub fn validation(message: impl Into<String>) -> Self {
        GraphError::Validation {
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Classification of the underlying remote failure, if any
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            GraphError::Remote(failure) => Some(failure.kind),
            _ => None,
        }
    }

    /// True when the failure would surface as a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, GraphError::Validation { .. })
            || self.failure_kind() == Some(FailureKind::MissingScope)
    }
}

impl From<DomainError> for GraphError {
    fn from(err: DomainError) -> Self {
        GraphError::validation(err.to_string())
    }
}

fn remote_details(failure: &GraphFailure) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("http_status".into(), json!(failure.http_status));
    details.insert("failure_kind".into(), json!(failure.kind.name()));
    if let Some(code) = failure.remote_code {
        details.insert("remote_code".into(), json!(code));
    }
    if let Some(subcode) = failure.remote_subcode {
        details.insert("remote_subcode".into(), json!(subcode));
    }
    if let Some(message) = &failure.message {
        details.insert("remote_message".into(), json!(message));
    }
    if let Some(kind) = &failure.remote_type {
        details.insert("remote_type".into(), json!(kind));
    }
    if let Some(trace) = &failure.fbtrace_id {
        details.insert("fbtrace_id".into(), json!(trace));
    }
    details
}

impl From<GraphFailure> for ApiError {
    fn from(failure: GraphFailure) -> Self {
        let mut details = remote_details(&failure);
        let message = failure.to_string();

        match failure.kind {
            FailureKind::Network => ApiError::network(message).with_details(details),
            FailureKind::MissingScope => {
                details.insert("required_scope".into(), json!(INSIGHTS_SCOPE));
                ApiError::validation(message).with_details(details)
            }
            FailureKind::ActionBlocked => {
                details.insert("action_blocked".into(), json!(true));
                details.insert(
                    "retry_after_seconds".into(),
                    json!(ACTION_BLOCK_RETRY_AFTER_SECS),
                );
                details.insert("retryable".into(), json!(false));
                ApiError::provider(message).with_details(details)
            }
            FailureKind::RateLimited | FailureKind::MediaNotReady => {
                details.insert("retryable".into(), json!(true));
                ApiError::provider(message).with_details(details)
            }
            FailureKind::UnsupportedMetric | FailureKind::Provider => {
                ApiError::provider(message).with_details(details)
            }
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        let message = err.to_string();
        match err {
            GraphError::Remote(failure) => failure.into(),
            GraphError::ContainerFailed {
                creation_id,
                status_code,
                status,
            } => {
                let mut details = Map::new();
                details.insert("creation_id".into(), json!(creation_id));
                details.insert("container_status".into(), json!("error"));
                details.insert("status_code".into(), json!(status_code));
                if let Some(status) = status {
                    details.insert("status".into(), json!(status));
                }
                ApiError::provider(message).with_details(details)
            }
            GraphError::ContainerTimedOut {
                creation_id,
                attempts,
            } => {
                let mut details = Map::new();
                details.insert("creation_id".into(), json!(creation_id));
                details.insert("container_status".into(), json!("timed_out"));
                details.insert("attempts".into(), json!(attempts));
                ApiError::provider(message).with_details(details)
            }
            GraphError::AuthRequired(_) => ApiError::auth_required(message),
            GraphError::Validation { details, .. } => {
                ApiError::validation(message).with_details(details)
            }
            GraphError::Config(_) | GraphError::Storage(_) => ApiError::config(message),
            GraphError::InvalidResponse(_) => ApiError::provider(message),
        }
    }
}
