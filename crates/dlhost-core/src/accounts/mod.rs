//! Account and session store.
//!
//! Holds per-service credentials and the derived session token. Tokens are
//! refreshed lazily before use; refresh is single-flight per account, so N
//! concurrent callers hitting an expired session produce exactly one upstream
//! call and share its result. The store is the sole mutator of the token.

mod file;
mod session;

pub use file::{accounts_path, list_accounts, load_into, upsert_account, AccountCred, StoredSessionApi};
pub use session::{AccountApi, AccountInfo, SessionInfo};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no account configured for service {0}")]
    Missing(String),
    #[error("account {login} on {service} rejected upstream: {reason}")]
    Rejected {
        service: String,
        login: String,
        reason: String,
    },
}

struct AccountEntry {
    login: String,
    secret: String,
    /// Serializes refreshes for this account (single-flight).
    refresh: Mutex<()>,
    cached: RwLock<Option<SessionInfo>>,
}

impl AccountEntry {
    fn valid_session(&self, now: SystemTime) -> Option<SessionInfo> {
        self.cached
            .read()
            .unwrap()
            .as_ref()
            .filter(|s| s.is_valid_at(now))
            .cloned()
    }
}

/// Per-service account store, shared read-only by all jobs.
pub struct AccountStore {
    api: Arc<dyn AccountApi>,
    entries: RwLock<HashMap<String, Arc<AccountEntry>>>,
}

impl AccountStore {
    pub fn new(api: Arc<dyn AccountApi>) -> Self {
        Self {
            api,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Add or overwrite the account for a service. Any cached session for a
    /// previous credential set is dropped.
    pub fn set_account(&self, service: &str, login: &str, secret: &str) {
        let entry = Arc::new(AccountEntry {
            login: login.to_string(),
            secret: secret.to_string(),
            refresh: Mutex::new(()),
            cached: RwLock::new(None),
        });
        self.entries
            .write()
            .unwrap()
            .insert(service.to_string(), entry);
    }

    /// True if a (premium-capable or not) account exists for the service.
    pub fn has_account(&self, service: &str) -> bool {
        self.entries.read().unwrap().contains_key(service)
    }

    /// Configured services, for status listings.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a valid session for the service, refreshing through the
    /// upstream API if the cached one is absent or expired.
    ///
    /// Concurrent callers for the same expired account block on the entry's
    /// refresh mutex; whoever wins performs the one upstream call, and the
    /// rest find the fresh token on re-check.
    pub fn get_session(&self, service: &str) -> Result<SessionInfo, AuthError> {
        let entry = self
            .entries
            .read()
            .unwrap()
            .get(service)
            .cloned()
            .ok_or_else(|| AuthError::Missing(service.to_string()))?;

        let now = SystemTime::now();
        if let Some(session) = entry.valid_session(now) {
            return Ok(session);
        }

        let _guard = entry.refresh.lock().unwrap();
        // A concurrent caller may have refreshed while we waited for the lock.
        if let Some(session) = entry.valid_session(SystemTime::now()) {
            return Ok(session);
        }

        let info = self
            .api
            .fetch_account_info(service, &entry.login, &entry.secret)?;
        let session = SessionInfo {
            token: info.session,
            premium: info.premium,
            expires_at: info.expires_at,
        };
        *entry.cached.write().unwrap() = Some(session.clone());
        tracing::debug!(service, login = %entry.login, "session refreshed");
        Ok(session)
    }

    /// Drop the cached session so the next `get_session` must refresh.
    /// Called by the executor when a premium request is rejected.
    pub fn invalidate(&self, service: &str) {
        if let Some(entry) = self.entries.read().unwrap().get(service) {
            *entry.cached.write().unwrap() = None;
            tracing::debug!(service, "session invalidated");
        }
    }
}
