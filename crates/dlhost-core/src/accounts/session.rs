//! Session types and the upstream account API seam.

use std::time::SystemTime;

use super::AuthError;

/// What the upstream account API returns for a login: a service-issued
/// session token, its expiry, and the premium flag.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub session: String,
    pub expires_at: SystemTime,
    pub premium: bool,
}

/// Cached session handed to the executor.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub token: String,
    pub premium: bool,
    pub expires_at: SystemTime,
}

impl SessionInfo {
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        self.expires_at > now
    }
}

/// Upstream account API. Implementations perform the service's
/// `getAccountInfo`-style call; the store never caches a failure.
pub trait AccountApi: Send + Sync {
    fn fetch_account_info(
        &self,
        service: &str,
        login: &str,
        secret: &str,
    ) -> Result<AccountInfo, AuthError>;
}
