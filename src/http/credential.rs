//! Bearer credentials with single-flight refresh

use crate::events::{EventBus, SyncEvent};
use crate::{Result, SyncError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Access/refresh tokens for the signed-in user.
///
/// At most one refresh is in flight at a time: callers that hit a 401 while a
/// refresh is running wait for it and reuse its token.
#[derive(Debug)]
pub struct CredentialStore {
    tokens: RwLock<Tokens>,
    refresh_lock: tokio::sync::Mutex<()>,
    refreshes: AtomicU64,
    events: EventBus,
}

impl CredentialStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            tokens: RwLock::new(Tokens::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            refreshes: AtomicU64::new(0),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tokens> {
        self.tokens.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tokens> {
        self.tokens.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Store tokens after login
    pub fn set_tokens(&self, access: impl Into<String>, refresh: Option<String>) {
        let mut tokens = self.write();
        tokens.access = Some(access.into());
        tokens.refresh = refresh;
    }

    pub fn set_access_token(&self, access: impl Into<String>) {
        self.write().access = Some(access.into());
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().access.is_some()
    }

    /// Drop both tokens. Returns whether anything was stored.
    pub fn clear(&self) -> bool {
        let mut tokens = self.write();
        let had_token = tokens.access.is_some() || tokens.refresh.is_some();
        *tokens = Tokens::default();
        had_token
    }

    /// Wipe credentials and announce the expired session once
    pub fn expire_session(&self) {
        if self.clear() {
            tracing::warn!("Session expired, credentials cleared");
            self.events.emit(SyncEvent::SessionExpired);
        }
    }

    /// Number of refresh calls actually issued
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Obtain a fresh access token after a 401.
    ///
    /// `stale` is the token the rejected request carried. If another caller
    /// already replaced it while this one waited, that token is reused and
    /// `refresh` is not called. A failed refresh expires the session.
    pub async fn refresh_with<F, Fut>(&self, stale: Option<&str>, refresh: F) -> Result<String>
    where
        F: FnOnce(Option<String>) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let _guard = self.refresh_lock.lock().await;

        let current = self.access_token();
        if current.as_deref() != stale {
            tracing::debug!("Token already refreshed by a concurrent request");
            return current.ok_or(SyncError::AuthExpired);
        }

        self.refreshes.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Refreshing access token");

        match refresh(self.refresh_token()).await {
            Ok(token) => {
                self.set_access_token(token.clone());
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                self.expire_session();
                Err(SyncError::AuthExpired)
            }
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}
