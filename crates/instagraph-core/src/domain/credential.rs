//! Credential and pending OAuth challenge types
//!
//! A [`Credential`] is the durable result of an OAuth exchange (or of direct
//! token provisioning). It is owned by the storage collaborator and is
//! replaced wholesale, never mutated in place.
//!
//! A [`PendingAuthChallenge`] holds the CSRF `state` and PKCE verifier between
//! issuing an authorization URL and completing the callback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access credential for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent with every Graph call
    pub access_token: String,
    /// Refresh token, when the provider issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Instagram business/creator user id
    pub ig_user_id: String,
    /// Scopes granted to the token
    #[serde(default)]
    pub scope: Vec<String>,
    /// Expiry of the access token, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a credential with no refresh token, scopes or expiry
    pub fn new(access_token: impl Into<String>, ig_user_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            ig_user_id: ig_user_id.into(),
            scope: Vec::new(),
            expires_at: None,
        }
    }

    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true if the token has a known expiry in the past
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns true if the given scope was granted
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }

    /// Token-free view of the credential, safe to hand back to callers
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            authenticated: true,
            ig_user_id: Some(self.ig_user_id.clone()),
            scope: self.scope.clone(),
            expires_at: self.expires_at,
            expired: self.is_expired(),
        }
    }
}

/// Caller-facing description of a stored credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ig_user_id: Option<String>,
    pub scope: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

impl CredentialSummary {
    /// Summary reported when no credential is stored
    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            ig_user_id: None,
            scope: Vec::new(),
            expires_at: None,
            expired: false,
        }
    }
}

/// OAuth challenge awaiting its callback
///
/// At most one is live per account; issuing a new authorization URL
/// supersedes the previous challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthChallenge {
    /// CSRF state echoed back by the authorization server
    pub state: String,
    /// PKCE code verifier (the secret half of the S256 challenge)
    pub code_verifier: String,
    /// Redirect URI used when the URL was issued; must match at exchange
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthChallenge {
    pub fn new(
        state: impl Into<String>,
        code_verifier: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            code_verifier: code_verifier.into(),
            redirect_uri: redirect_uri.into(),
            created_at: Utc::now(),
        }
    }

    /// Returns true if `state` matches the stored CSRF state
    pub fn matches_state(&self, state: &str) -> bool {
        self.state == state
    }
}
