//! Credential store port (driven/secondary port)
//!
//! Durable state lives outside this crate. Callers inject an
//! [`ICredentialStore`] that reads and writes account-scoped credentials and
//! the pending OAuth challenge; the provider never caches either between
//! calls.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (keyring, file, database) and don't need domain-level classification.
//! - Credentials are replaced wholesale by `save_credential`.
//! - Concurrent writers from independent processes are not coordinated here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use crate::domain::{Credential, PendingAuthChallenge};

/// Port trait for account-scoped credential storage
#[async_trait::async_trait]
pub trait ICredentialStore: Send + Sync {
    /// Loads the credential for `account`, if any
    async fn load_credential(&self, account: &str) -> Result<Option<Credential>>;

    /// Stores `credential` for `account`, replacing any previous one
    async fn save_credential(&self, account: &str, credential: &Credential) -> Result<()>;

    /// Loads the live OAuth challenge for `account`, if any
    async fn load_pending_auth(&self, account: &str) -> Result<Option<PendingAuthChallenge>>;

    /// Stores `challenge` for `account`, superseding any previous challenge
    async fn save_pending_auth(&self, account: &str, challenge: &PendingAuthChallenge)
        -> Result<()>;

    /// Removes the live OAuth challenge for `account`
    async fn clear_pending_auth(&self, account: &str) -> Result<()>;
}

/// Inbound contract handed to every provider operation
#[derive(Clone)]
pub struct ProviderContext {
    /// Account name credentials are scoped by
    pub account: String,
    /// Injected storage collaborator
    pub store: Arc<dyn ICredentialStore>,
    /// When set, operations return canned success values without remote calls
    pub dry_run: bool,
}

impl ProviderContext {
    pub fn new(account: impl Into<String>, store: Arc<dyn ICredentialStore>) -> Self {
        Self {
            account: account.into(),
            store,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn credential(&self) -> Result<Option<Credential>> {
        self.store.load_credential(&self.account).await
    }

    pub async fn set_credential(&self, credential: &Credential) -> Result<()> {
        self.store.save_credential(&self.account, credential).await
    }
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("account", &self.account)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    credentials: HashMap<String, Credential>,
    pending: HashMap<String, PendingAuthChallenge>,
}

/// Process-local [`ICredentialStore`], for tests and embedding callers
/// that manage persistence themselves
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<MemoryState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `credential` for `account`
    pub fn with_credential(account: &str, credential: Credential) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.credentials.insert(account.to_string(), credential);
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("credential store lock poisoned"))
    }
}

#[async_trait::async_trait]
impl ICredentialStore for MemoryCredentialStore {
    async fn load_credential(&self, account: &str) -> Result<Option<Credential>> {
        Ok(self.lock()?.credentials.get(account).cloned())
    }

    async fn save_credential(&self, account: &str, credential: &Credential) -> Result<()> {
        self.lock()?
            .credentials
            .insert(account.to_string(), credential.clone());
        Ok(())
    }

    async fn load_pending_auth(&self, account: &str) -> Result<Option<PendingAuthChallenge>> {
        Ok(self.lock()?.pending.get(account).cloned())
    }

    async fn save_pending_auth(
        &self,
        account: &str,
        challenge: &PendingAuthChallenge,
    ) -> Result<()> {
        self.lock()?
            .pending
            .insert(account.to_string(), challenge.clone());
        Ok(())
    }

    async fn clear_pending_auth(&self, account: &str) -> Result<()> {
        self.lock()?.pending.remove(account);
        Ok(())
    }
}
