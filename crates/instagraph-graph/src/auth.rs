//! OAuth2 PKCE authentication flow for the Instagram Graph API
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636, `S256`) in
//! two steps that may run in separate processes:
//!
//! 1. [`OAuthFlow::start`] builds the authorization URL and records a
//!    [`PendingAuthChallenge`] through the credential store.
//! 2. [`OAuthFlow::finish`] checks the returned `state`, exchanges the code
//!    and verifier for a token, resolves the Instagram user id and stores the
//!    [`Credential`].
//!
//! The code exchange goes through [`GraphClient`] so its failures are
//! classified like every other remote call. It is never retried.

use chrono::{DateTime, Duration, Utc};
use instagraph_core::config::OAuthConfig;
use instagraph_core::domain::{Credential, PendingAuthChallenge};
use instagraph_core::ports::{AuthStart, ICredentialStore};
use oauth2::{basic::BasicClient, AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::client::GraphClient;
use crate::GraphError;

/// Token exchange endpoint, relative to the Graph base URL
const TOKEN_PATH: &str = "/oauth/access_token";

/// Pages endpoint used to find the linked Instagram account
const ACCOUNTS_PATH: &str = "/me/accounts";

// ============================================================================
// Types
// ============================================================================

/// Authorization URL plus the secrets that must survive until the callback
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub login_url: String,
    pub state: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// Result of a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds, when the remote reported one
    pub expires_in: Option<u64>,
}

// ============================================================================
// OAuthFlow
// ============================================================================

/// PKCE authorization flow bound to one transport and one `oauth` config
pub struct OAuthFlow<'a> {
    client: &'a GraphClient,
    config: &'a OAuthConfig,
}

impl<'a> OAuthFlow<'a> {
    pub fn new(client: &'a GraphClient, config: &'a OAuthConfig) -> Self {
        Self { client, config }
    }

    fn client_id(&self) -> Result<&str, GraphError> {
        self.config
            .client_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| GraphError::Config("oauth.client_id is not configured".to_string()))
    }

    fn client_secret(&self) -> Result<&str, GraphError> {
        self.config
            .client_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| {
                GraphError::Config("oauth.client_secret is not configured".to_string())
            })
    }

    /// Builds an authorization URL with a fresh CSRF state and PKCE pair
    ///
    /// Nothing is persisted here; see [`OAuthFlow::start`].
    pub fn authorization_request(
        &self,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, GraphError> {
        let client_id = self.client_id()?;
        let auth_url = AuthUrl::new(self.config.authorize_url.clone())
            .map_err(|e| GraphError::Config(format!("Invalid authorize URL: {e}")))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|e| {
            GraphError::validation(format!("Invalid redirect URI '{redirect_uri}': {e}"))
        })?;

        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = client.authorize_url(CsrfToken::new_random);
        for scope in &self.config.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (login_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        Ok(AuthorizationRequest {
            login_url: login_url.to_string(),
            state: csrf_token.secret().clone(),
            code_verifier: pkce_verifier.secret().clone(),
            redirect_uri: redirect_uri.to_string(),
        })
    }

    /// Issues an authorization URL and records the pending challenge
    ///
    /// Any previous challenge for `account` is superseded.
    pub async fn start(
        &self,
        store: &dyn ICredentialStore,
        account: &str,
        redirect_override: Option<&str>,
    ) -> Result<AuthStart, GraphError> {
        let redirect_uri = redirect_override.unwrap_or(&self.config.redirect_uri);
        let request = self.authorization_request(redirect_uri)?;

        let challenge = PendingAuthChallenge::new(
            request.state.clone(),
            request.code_verifier,
            request.redirect_uri.clone(),
        );
        store
            .save_pending_auth(account, &challenge)
            .await
            .map_err(GraphError::Storage)?;

        info!(account, redirect_uri = %request.redirect_uri, "Issued authorization URL");
        Ok(AuthStart {
            login_url: request.login_url,
            state: request.state,
            redirect_uri: request.redirect_uri,
        })
    }

    /// Completes the callback: verifies state, exchanges the code and stores
    /// the resulting credential
    pub async fn finish(
        &self,
        store: &dyn ICredentialStore,
        account: &str,
        code: &str,
        state: &str,
    ) -> Result<Credential, GraphError> {
        let pending = store
            .load_pending_auth(account)
            .await
            .map_err(GraphError::Storage)?
            .ok_or_else(|| {
                GraphError::AuthRequired(format!(
                    "No pending authorization for account '{account}'; start the OAuth flow first"
                ))
            })?;

        if !pending.matches_state(state) {
            warn!(account, "OAuth state mismatch");
            let mut details = Map::new();
            details.insert("reason".into(), json!("state_mismatch"));
            return Err(GraphError::Validation {
                message: "OAuth state does not match the pending authorization".to_string(),
                details,
            });
        }

        if code.trim().is_empty() {
            return Err(GraphError::validation("Authorization code is empty"));
        }

        let grant = self
            .exchange_code(code, &pending.code_verifier, &pending.redirect_uri)
            .await?;
        let ig_user_id = self.resolve_ig_user_id(&grant.access_token).await?;

        let mut credential =
            Credential::new(grant.access_token, ig_user_id).with_scope(self.config.scopes.clone());
        if let Some(secs) = grant.expires_in {
            match expiry_after(secs) {
                Some(expires_at) => credential = credential.with_expires_at(expires_at),
                None => warn!(account, expires_in = secs, "Ignoring out-of-range token lifetime"),
            }
        }

        store
            .save_credential(account, &credential)
            .await
            .map_err(GraphError::Storage)?;
        store
            .clear_pending_auth(account)
            .await
            .map_err(GraphError::Storage)?;

        info!(account, ig_user_id = %credential.ig_user_id, "OAuth flow completed");
        Ok(credential)
    }

    /// Exchanges an authorization code and PKCE verifier for an access token
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, GraphError> {
        let params = [
            ("client_id", self.client_id()?.to_string()),
            ("client_secret", self.client_secret()?.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("code", code.to_string()),
            ("code_verifier", code_verifier.to_string()),
        ];

        info!("Exchanging authorization code for access token");
        let body = self.client.get(TOKEN_PATH, &params, None).await?;

        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                GraphError::InvalidResponse("token response has no access_token".to_string())
            })?
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_u64);

        Ok(TokenGrant {
            access_token,
            expires_in,
        })
    }

    /// Finds the first Instagram professional account linked to the
    /// token's Facebook pages
    pub async fn resolve_ig_user_id(&self, access_token: &str) -> Result<String, GraphError> {
        let body = self
            .client
            .get(
                ACCOUNTS_PATH,
                &[("fields", "id,name,instagram_business_account".to_string())],
                Some(access_token),
            )
            .await?;

        body.get("data")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find_map(|page| {
                page.get("instagram_business_account")
                    .and_then(|acct| acct.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                GraphError::validation(
                    "No Instagram professional account is linked to the authorized pages",
                )
            })
    }
}

/// `now + secs`, or `None` when the lifetime does not fit a timestamp
fn expiry_after(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}
