//! Credential Manager
//!
//! Startup policy: load the cached token and refresh it; when nothing is
//! cached or it cannot be renewed, fall back to interactive login. The
//! resulting token is shared read-only by every session and written back
//! once when the process shuts down.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use super::{AuthProvider, CredentialError, CredentialStore, Token};

/// Owns the process-wide token
pub struct CredentialManager {
    store: CredentialStore,
    provider: Arc<dyn AuthProvider>,
    current: RwLock<Token>,
}

impl CredentialManager {
    /// Acquire a usable token according to the startup policy
    pub async fn acquire(
        store: CredentialStore,
        provider: Arc<dyn AuthProvider>,
    ) -> Result<Self, CredentialError> {
        let token = match store.load() {
            Ok(cached) => match provider.refresh(&cached).await {
                Ok(token) => {
                    info!("Using cached credentials from {}", store.path().display());
                    token
                }
                Err(CredentialError::Expired) => {
                    info!("Cached credentials expired, interactive login required");
                    provider.obtain_interactive().await?
                }
                Err(e) => {
                    warn!("Failed to refresh cached credentials: {}", e);
                    provider.obtain_interactive().await?
                }
            },
            Err(_) => {
                info!("No cached credentials, interactive login required");
                provider.obtain_interactive().await?
            }
        };

        Ok(Self {
            store,
            provider,
            current: RwLock::new(token),
        })
    }

    /// Current token, renewed first if it has expired.
    ///
    /// A token the provider cannot renew stays in service: the process
    /// keeps the credentials it started with rather than re-authenticating
    /// per session.
    pub async fn token(&self) -> Token {
        let token = self.snapshot();
        if !token.is_expired() {
            return token;
        }

        debug!("Active token expired, refreshing");
        match self.provider.refresh(&token).await {
            Ok(renewed) => {
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = renewed.clone();
                renewed
            }
            Err(e) => {
                warn!("Could not renew credentials, keeping the current token: {}", e);
                token
            }
        }
    }

    /// Copy of the active token without attempting renewal
    pub fn snapshot(&self) -> Token {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write the active token to the credential store
    pub fn persist(&self) -> Result<(), CredentialError> {
        self.store.persist(&self.snapshot())
    }

    /// Guard that persists the token when dropped
    pub fn persist_guard(self: &Arc<Self>) -> PersistGuard {
        PersistGuard {
            manager: Arc::clone(self),
        }
    }
}

/// Writes the active token back to disk on drop, whichever way the process
/// leaves the scope that holds it. Failures are logged.
pub struct PersistGuard {
    manager: Arc<CredentialManager>,
}

impl Drop for PersistGuard {
    fn drop(&mut self) {
        if let Err(e) = self.manager.persist() {
            error!("Failed to save credentials: {}", e);
        }
    }
}
